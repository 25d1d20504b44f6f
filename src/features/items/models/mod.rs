pub mod item;
pub mod item_photo;

pub use item::Item;
pub use item_photo::ItemPhoto;
