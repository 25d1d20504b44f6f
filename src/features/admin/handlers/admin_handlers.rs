use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};

use crate::core::error::Result;
use crate::features::admin::dtos::{CategoryForm, CategoryFormDoc, ItemForm, ItemFormDoc, RawForm};
use crate::features::admin::services::AdminService;
use crate::features::categories::dtos::CategoryResponseDto;
use crate::features::items::dtos::ItemResponseDto;
use crate::shared::types::ErrorResponse;

/// Add a category from the admin form
///
/// Accepts multipart/form-data with:
/// - `name`: category name (required)
/// - `icon`: image file (optional)
#[utoipa::path(
    post,
    path = "/admin/categories",
    request_body(
        content = CategoryFormDoc,
        content_type = "multipart/form-data",
    ),
    responses(
        (status = 201, description = "Category created", body = CategoryResponseDto),
        (status = 400, description = "Invalid form or upload", body = ErrorResponse),
        (status = 413, description = "Request body too large")
    ),
    tag = "admin"
)]
pub async fn create_category(
    State(service): State<Arc<AdminService>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CategoryResponseDto>)> {
    let raw = RawForm::read(&mut multipart, service.max_file_size()).await?;
    let category = service.save_category(None, CategoryForm::bind(raw)?).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// Edit a category from the admin form
///
/// Same fields as the add form. A new `icon` replaces the old one;
/// `icon-clear=on` removes it.
#[utoipa::path(
    post,
    path = "/admin/categories/{id}",
    params(
        ("id" = i64, Path, description = "Category ID")
    ),
    request_body(
        content = CategoryFormDoc,
        content_type = "multipart/form-data",
    ),
    responses(
        (status = 200, description = "Category updated", body = CategoryResponseDto),
        (status = 400, description = "Invalid form or upload", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn update_category(
    State(service): State<Arc<AdminService>>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<CategoryResponseDto>> {
    let raw = RawForm::read(&mut multipart, service.max_file_size()).await?;
    let category = service
        .save_category(Some(id), CategoryForm::bind(raw)?)
        .await?;
    Ok(Json(category))
}

/// Add an item from the admin form
///
/// Every `photo_uploads` file is stored as `photos/{id}-{filename}` and
/// appended to the item's photos.
#[utoipa::path(
    post,
    path = "/admin/items",
    request_body(
        content = ItemFormDoc,
        content_type = "multipart/form-data",
    ),
    responses(
        (status = 201, description = "Item created", body = ItemResponseDto),
        (status = 400, description = "Invalid form or upload", body = ErrorResponse),
        (status = 409, description = "Photo name already used on this item", body = ErrorResponse),
        (status = 413, description = "Request body too large")
    ),
    tag = "admin"
)]
pub async fn create_item(
    State(service): State<Arc<AdminService>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ItemResponseDto>)> {
    let raw = RawForm::read(&mut multipart, service.max_file_size()).await?;
    let item = service.save_item(None, ItemForm::bind(raw)?).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Edit an item from the admin form
///
/// Photo uploads are appended to the existing photos.
/// `avatar_photo-clear=on` removes the avatar.
#[utoipa::path(
    post,
    path = "/admin/items/{id}",
    params(
        ("id" = i64, Path, description = "Item ID")
    ),
    request_body(
        content = ItemFormDoc,
        content_type = "multipart/form-data",
    ),
    responses(
        (status = 200, description = "Item updated", body = ItemResponseDto),
        (status = 400, description = "Invalid form or upload", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse),
        (status = 409, description = "Photo name already used on this item", body = ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn update_item(
    State(service): State<Arc<AdminService>>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<ItemResponseDto>> {
    let raw = RawForm::read(&mut multipart, service.max_file_size()).await?;
    let item = service.save_item(Some(id), ItemForm::bind(raw)?).await?;
    Ok(Json(item))
}
