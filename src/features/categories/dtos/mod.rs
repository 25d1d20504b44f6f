pub mod category_dto;

pub use category_dto::{
    CategoryInput, CategoryListItemDto, CategoryResponseDto, PatchCategoryDto,
};
