pub mod admin_form;

pub use admin_form::{
    CategoryForm, CategoryFormDoc, ItemForm, ItemFormDoc, RawForm, AVATAR_FIELD, ICON_FIELD,
};
