pub mod item_dto;

pub use item_dto::{ItemInput, ItemResponseDto, PatchItemDto};
