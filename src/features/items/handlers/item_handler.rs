use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::core::error::Result;
use crate::core::extractor::AppJson;
use crate::features::items::dtos::{ItemInput, ItemResponseDto, PatchItemDto};
use crate::features::items::services::ItemService;
use crate::shared::types::ErrorResponse;

/// List all items
#[utoipa::path(
    get,
    path = "/api/items",
    responses(
        (status = 200, description = "List of items", body = Vec<ItemResponseDto>),
    ),
    tag = "items"
)]
pub async fn list_items(
    State(service): State<Arc<ItemService>>,
) -> Result<Json<Vec<ItemResponseDto>>> {
    Ok(Json(service.list().await?))
}

/// Get item by id
#[utoipa::path(
    get,
    path = "/api/items/{id}",
    params(
        ("id" = i64, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item found", body = ItemResponseDto),
        (status = 404, description = "Item not found", body = ErrorResponse)
    ),
    tag = "items"
)]
pub async fn get_item(
    State(service): State<Arc<ItemService>>,
    Path(id): Path<i64>,
) -> Result<Json<ItemResponseDto>> {
    Ok(Json(service.get(id).await?))
}

/// Create an item
///
/// `avatar_photo` and `photos` are ignored here; they are set through the
/// admin form.
#[utoipa::path(
    post,
    path = "/api/items",
    request_body = ItemInput,
    responses(
        (status = 201, description = "Item created", body = ItemResponseDto),
        (status = 400, description = "Validation error", body = ErrorResponse)
    ),
    tag = "items"
)]
pub async fn create_item(
    State(service): State<Arc<ItemService>>,
    AppJson(input): AppJson<ItemInput>,
) -> Result<(StatusCode, Json<ItemResponseDto>)> {
    let item = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Replace an item's writable fields
#[utoipa::path(
    put,
    path = "/api/items/{id}",
    params(
        ("id" = i64, Path, description = "Item ID")
    ),
    request_body = ItemInput,
    responses(
        (status = 200, description = "Item updated", body = ItemResponseDto),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse)
    ),
    tag = "items"
)]
pub async fn replace_item(
    State(service): State<Arc<ItemService>>,
    Path(id): Path<i64>,
    AppJson(input): AppJson<ItemInput>,
) -> Result<Json<ItemResponseDto>> {
    Ok(Json(service.replace(id, input).await?))
}

/// Partially update an item
#[utoipa::path(
    patch,
    path = "/api/items/{id}",
    params(
        ("id" = i64, Path, description = "Item ID")
    ),
    request_body = PatchItemDto,
    responses(
        (status = 200, description = "Item updated", body = ItemResponseDto),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse)
    ),
    tag = "items"
)]
pub async fn patch_item(
    State(service): State<Arc<ItemService>>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<PatchItemDto>,
) -> Result<Json<ItemResponseDto>> {
    Ok(Json(service.patch(id, patch).await?))
}

/// Delete an item and its photos
#[utoipa::path(
    delete,
    path = "/api/items/{id}",
    params(
        ("id" = i64, Path, description = "Item ID")
    ),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "Item not found", body = ErrorResponse)
    ),
    tag = "items"
)]
pub async fn delete_item(
    State(service): State<Arc<ItemService>>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
