use std::sync::Arc;

use sqlx::{PgConnection, PgPool};
use tracing::info;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::categories::dtos::{
    CategoryInput, CategoryListItemDto, CategoryResponseDto, PatchCategoryDto,
};
use crate::features::categories::models::Category;
use crate::modules::storage::MediaStorage;

/// Column list for `categories` queries.
const CATEGORY_COLUMNS: &str = "id, name, icon";

/// Service for category operations
pub struct CategoryService {
    pool: PgPool,
    media: Arc<MediaStorage>,
}

impl CategoryService {
    pub fn new(pool: PgPool, media: Arc<MediaStorage>) -> Self {
        Self { pool, media }
    }

    /// List all categories (abbreviated projection)
    pub async fn list(&self) -> Result<Vec<CategoryListItemDto>> {
        let query = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id");
        let categories = sqlx::query_as::<_, Category>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list categories: {:?}", e);
                AppError::Database(e)
            })?;

        Ok(categories.into_iter().map(Into::into).collect())
    }

    /// Get category by id
    pub async fn get(&self, id: i64) -> Result<CategoryResponseDto> {
        let mut conn = self.pool.acquire().await?;
        find_category(&mut conn, id)
            .await?
            .map(Into::into)
            .ok_or_else(|| not_found(id))
    }

    pub async fn create(&self, input: CategoryInput) -> Result<CategoryResponseDto> {
        input.validate()?;

        let mut conn = self.pool.acquire().await?;
        let category = insert_category(&mut conn, &input).await?;
        info!("Category created: id={}, name={}", category.id, category.name);

        Ok(category.into())
    }

    /// Full update (PUT)
    pub async fn replace(&self, id: i64, input: CategoryInput) -> Result<CategoryResponseDto> {
        input.validate()?;

        let mut conn = self.pool.acquire().await?;
        update_category(&mut conn, id, &input)
            .await?
            .map(Into::into)
            .ok_or_else(|| not_found(id))
    }

    /// Partial update (PATCH)
    pub async fn patch(&self, id: i64, patch: PatchCategoryDto) -> Result<CategoryResponseDto> {
        let mut tx = self.pool.begin().await?;

        let current = find_category_for_update(&mut tx, id)
            .await?
            .ok_or_else(|| not_found(id))?;
        let input = patch.apply_to(&current);
        input.validate()?;

        let updated = update_category(&mut tx, id, &input)
            .await?
            .ok_or_else(|| not_found(id))?;
        tx.commit().await?;

        Ok(updated.into())
    }

    /// Delete a category together with its items and their photos.
    ///
    /// Media files referenced by the deleted rows are removed after the
    /// delete commits.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let media_paths = sqlx::query_scalar::<_, String>(
            "SELECT icon FROM categories WHERE id = $1 AND icon IS NOT NULL \
             UNION ALL \
             SELECT avatar_photo FROM items WHERE category_id = $1 AND avatar_photo IS NOT NULL \
             UNION ALL \
             SELECT p.path FROM item_photos p JOIN items i ON i.id = p.item_id \
             WHERE i.category_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        tx.commit().await?;

        info!(
            "Category deleted: id={}, media files released={}",
            id,
            media_paths.len()
        );
        self.media.remove_all(&media_paths).await;

        Ok(())
    }
}

pub(crate) fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Category with id {} not found", id))
}

pub(crate) async fn find_category(conn: &mut PgConnection, id: i64) -> Result<Option<Category>> {
    let query = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
    Ok(sqlx::query_as::<_, Category>(&query)
        .bind(id)
        .fetch_optional(conn)
        .await?)
}

pub(crate) async fn find_category_for_update(
    conn: &mut PgConnection,
    id: i64,
) -> Result<Option<Category>> {
    let query = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1 FOR UPDATE");
    Ok(sqlx::query_as::<_, Category>(&query)
        .bind(id)
        .fetch_optional(conn)
        .await?)
}

pub(crate) async fn insert_category(
    conn: &mut PgConnection,
    input: &CategoryInput,
) -> Result<Category> {
    let query = format!("INSERT INTO categories (name) VALUES ($1) RETURNING {CATEGORY_COLUMNS}");
    Ok(sqlx::query_as::<_, Category>(&query)
        .bind(&input.name)
        .fetch_one(conn)
        .await?)
}

pub(crate) async fn update_category(
    conn: &mut PgConnection,
    id: i64,
    input: &CategoryInput,
) -> Result<Option<Category>> {
    let query =
        format!("UPDATE categories SET name = $2 WHERE id = $1 RETURNING {CATEGORY_COLUMNS}");
    Ok(sqlx::query_as::<_, Category>(&query)
        .bind(id)
        .bind(&input.name)
        .fetch_optional(conn)
        .await?)
}

pub(crate) async fn set_category_icon(
    conn: &mut PgConnection,
    id: i64,
    icon: Option<&str>,
) -> Result<Category> {
    let query =
        format!("UPDATE categories SET icon = $2 WHERE id = $1 RETURNING {CATEGORY_COLUMNS}");
    sqlx::query_as::<_, Category>(&query)
        .bind(id)
        .bind(icon)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| not_found(id))
}
