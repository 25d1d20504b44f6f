use std::collections::HashMap;
use std::sync::Arc;

use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use crate::core::error::{AppError, Result};
use crate::features::items::dtos::{ItemInput, ItemResponseDto, PatchItemDto};
use crate::features::items::models::{Item, ItemPhoto};
use crate::features::items::services::photo_service::load_photo_paths;
use crate::modules::storage::MediaStorage;

/// Column list for `items` queries.
const ITEM_COLUMNS: &str = "\
    id, category_id, name, description, address, latitude, longitude, \
    working_hours, whatsapp_number, phone_numbers, avatar_photo";

/// Service for item operations
pub struct ItemService {
    pool: PgPool,
    media: Arc<MediaStorage>,
}

impl ItemService {
    pub fn new(pool: PgPool, media: Arc<MediaStorage>) -> Self {
        Self { pool, media }
    }

    /// List all items with their photos
    pub async fn list(&self) -> Result<Vec<ItemResponseDto>> {
        let query = format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY id");
        let items = sqlx::query_as::<_, Item>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list items: {:?}", e);
                AppError::Database(e)
            })?;

        let photos = sqlx::query_as::<_, ItemPhoto>(
            "SELECT id, item_id, path, position FROM item_photos ORDER BY item_id, position, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_item = group_photo_paths(photos);
        Ok(items
            .into_iter()
            .map(|item| {
                let paths = by_item.remove(&item.id).unwrap_or_default();
                ItemResponseDto::from_parts(item, paths)
            })
            .collect())
    }

    pub async fn get(&self, id: i64) -> Result<ItemResponseDto> {
        let mut conn = self.pool.acquire().await?;
        load_item(&mut conn, id).await?.ok_or_else(|| not_found(id))
    }

    pub async fn create(&self, input: ItemInput) -> Result<ItemResponseDto> {
        input.check()?;

        let mut conn = self.pool.acquire().await?;
        let item = insert_item(&mut conn, &input).await?;
        info!(
            "Item created: id={}, category_id={}, name={}",
            item.id, item.category_id, item.name
        );

        Ok(ItemResponseDto::from_parts(item, Vec::new()))
    }

    /// Full update (PUT)
    pub async fn replace(&self, id: i64, input: ItemInput) -> Result<ItemResponseDto> {
        input.check()?;

        let mut tx = self.pool.begin().await?;
        update_item(&mut tx, id, &input)
            .await?
            .ok_or_else(|| not_found(id))?;
        let dto = load_item(&mut tx, id).await?.ok_or_else(|| not_found(id))?;
        tx.commit().await?;

        Ok(dto)
    }

    /// Partial update (PATCH)
    pub async fn patch(&self, id: i64, patch: PatchItemDto) -> Result<ItemResponseDto> {
        let mut tx = self.pool.begin().await?;

        let current = find_item_for_update(&mut tx, id)
            .await?
            .ok_or_else(|| not_found(id))?;
        let input = patch.apply_to(ItemInput::from(&current))?;
        input.check()?;

        update_item(&mut tx, id, &input)
            .await?
            .ok_or_else(|| not_found(id))?;
        let dto = load_item(&mut tx, id).await?.ok_or_else(|| not_found(id))?;
        tx.commit().await?;

        Ok(dto)
    }

    /// Delete an item; its photo rows go with it and its media files are
    /// removed after the delete commits.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let media_paths = sqlx::query_scalar::<_, String>(
            "SELECT avatar_photo FROM items WHERE id = $1 AND avatar_photo IS NOT NULL \
             UNION ALL \
             SELECT path FROM item_photos WHERE item_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        tx.commit().await?;

        info!("Item deleted: id={}, media files released={}", id, media_paths.len());
        self.media.remove_all(&media_paths).await;

        Ok(())
    }
}

pub(crate) fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Item with id {} not found", id))
}

fn group_photo_paths(photos: Vec<ItemPhoto>) -> HashMap<i64, Vec<String>> {
    let mut by_item: HashMap<i64, Vec<String>> = HashMap::new();
    for photo in photos {
        by_item.entry(photo.item_id).or_default().push(photo.path);
    }
    by_item
}

/// Turn a failed insert/update into a field error when the category does not exist
fn map_write_error(e: sqlx::Error, category_id: i64) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_foreign_key_violation() {
            return AppError::field(
                "category",
                format!("Invalid pk \"{}\" - object does not exist.", category_id),
            );
        }
    }
    AppError::Database(e)
}

/// Item plus its photo paths, as served by the API
pub(crate) async fn load_item(conn: &mut PgConnection, id: i64) -> Result<Option<ItemResponseDto>> {
    let Some(item) = find_item(&mut *conn, id).await? else {
        return Ok(None);
    };
    let photos = load_photo_paths(&mut *conn, id).await?;
    Ok(Some(ItemResponseDto::from_parts(item, photos)))
}

pub(crate) async fn find_item(conn: &mut PgConnection, id: i64) -> Result<Option<Item>> {
    let query = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1");
    Ok(sqlx::query_as::<_, Item>(&query)
        .bind(id)
        .fetch_optional(conn)
        .await?)
}

pub(crate) async fn find_item_for_update(conn: &mut PgConnection, id: i64) -> Result<Option<Item>> {
    let query = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 FOR UPDATE");
    Ok(sqlx::query_as::<_, Item>(&query)
        .bind(id)
        .fetch_optional(conn)
        .await?)
}

pub(crate) async fn insert_item(conn: &mut PgConnection, input: &ItemInput) -> Result<Item> {
    let query = format!(
        "INSERT INTO items \
         (category_id, name, description, address, latitude, longitude, \
          working_hours, whatsapp_number, phone_numbers) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {ITEM_COLUMNS}"
    );
    sqlx::query_as::<_, Item>(&query)
        .bind(input.category)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.address)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(Json(&input.working_hours))
        .bind(&input.whatsapp_number)
        .bind(&input.phone_numbers)
        .fetch_one(conn)
        .await
        .map_err(|e| map_write_error(e, input.category))
}

pub(crate) async fn update_item(
    conn: &mut PgConnection,
    id: i64,
    input: &ItemInput,
) -> Result<Option<Item>> {
    let query = format!(
        "UPDATE items SET \
         category_id = $2, name = $3, description = $4, address = $5, \
         latitude = $6, longitude = $7, working_hours = $8, \
         whatsapp_number = $9, phone_numbers = $10 \
         WHERE id = $1 \
         RETURNING {ITEM_COLUMNS}"
    );
    sqlx::query_as::<_, Item>(&query)
        .bind(id)
        .bind(input.category)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.address)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(Json(&input.working_hours))
        .bind(&input.whatsapp_number)
        .bind(&input.phone_numbers)
        .fetch_optional(conn)
        .await
        .map_err(|e| map_write_error(e, input.category))
}

pub(crate) async fn set_item_avatar(
    conn: &mut PgConnection,
    id: i64,
    avatar_photo: Option<&str>,
) -> Result<Item> {
    let query =
        format!("UPDATE items SET avatar_photo = $2 WHERE id = $1 RETURNING {ITEM_COLUMNS}");
    sqlx::query_as::<_, Item>(&query)
        .bind(id)
        .bind(avatar_photo)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| not_found(id))
}
