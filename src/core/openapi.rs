use utoipa::{Modify, OpenApi};

use crate::features::admin::{dtos as admin_dtos, handlers as admin_handlers};
use crate::features::categories::{dtos as categories_dtos, handlers as categories_handlers};
use crate::features::items::{dtos as items_dtos, handlers as items_handlers};
use crate::shared::types::ErrorResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        // Categories
        categories_handlers::list_categories,
        categories_handlers::get_category,
        categories_handlers::create_category,
        categories_handlers::replace_category,
        categories_handlers::patch_category,
        categories_handlers::delete_category,
        // Items
        items_handlers::list_items,
        items_handlers::get_item,
        items_handlers::create_item,
        items_handlers::replace_item,
        items_handlers::patch_item,
        items_handlers::delete_item,
        // Admin form
        admin_handlers::create_category,
        admin_handlers::update_category,
        admin_handlers::create_item,
        admin_handlers::update_item,
    ),
    components(
        schemas(
            // Shared
            ErrorResponse,
            // Categories
            categories_dtos::CategoryListItemDto,
            categories_dtos::CategoryResponseDto,
            categories_dtos::CategoryInput,
            categories_dtos::PatchCategoryDto,
            // Items
            items_dtos::ItemResponseDto,
            items_dtos::ItemInput,
            items_dtos::PatchItemDto,
            // Admin form
            admin_dtos::CategoryFormDoc,
            admin_dtos::ItemFormDoc,
        )
    ),
    tags(
        (name = "categories", description = "Business categories"),
        (name = "items", description = "Directory items (businesses and places)"),
        (name = "admin", description = "Admin form with icon, avatar and photo uploads"),
    ),
    info(
        title = "Direktori API",
        version = "0.1.0",
        description = "API documentation for the business directory",
    )
)]
pub struct ApiDoc;

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
