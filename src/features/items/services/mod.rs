pub mod item_service;
pub mod photo_service;

pub use item_service::ItemService;
pub use photo_service::PhotoAssociationService;
