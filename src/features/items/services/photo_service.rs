//! Photo association: attaching uploaded image files to an item.
//!
//! Work happens in three steps so validation stays separate from I/O:
//! 1. [`plan_photo_paths`] turns uploads into media paths (pure),
//! 2. the files are written under the media root,
//! 3. the new paths are inserted as `item_photos` rows in one statement.

use std::collections::HashSet;
use std::sync::Arc;

use sqlx::PgConnection;
use tracing::{info, warn};

use crate::core::error::{AppError, Result};
use crate::modules::storage::{MediaKind, MediaStorage};
use crate::shared::constants::MAX_MEDIA_PATH_LEN;
use crate::shared::types::UploadedFile;
use crate::shared::validation::sanitize_upload_filename;

/// Form field the photo uploads arrive in
pub const PHOTO_UPLOADS_FIELD: &str = "photo_uploads";

/// Result of attaching uploads to an item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoAttachOutcome {
    /// Paths appended to the item, in upload order
    pub added: Vec<String>,
    /// Whether the photo rows were written (false when nothing was uploaded)
    pub persisted: bool,
}

/// Compute `photos/{item_id}-{filename}` for every upload.
///
/// Fails without side effects when a name is unusable, or when it collides
/// with another upload in the batch or with a photo already on the item.
pub fn plan_photo_paths(
    item_id: i64,
    existing: &[String],
    uploads: &[UploadedFile],
) -> Result<Vec<String>> {
    let mut planned = Vec::with_capacity(uploads.len());

    for upload in uploads {
        let name = sanitize_upload_filename(&upload.file_name).ok_or_else(|| {
            AppError::field(
                PHOTO_UPLOADS_FIELD,
                format!("\"{}\" is not a usable file name", upload.file_name),
            )
        })?;

        let path = MediaKind::Photo.path_for(item_id, &name);
        if path.len() > MAX_MEDIA_PATH_LEN {
            return Err(AppError::field(
                PHOTO_UPLOADS_FIELD,
                format!("file name \"{}\" is too long", name),
            ));
        }
        planned.push(path);
    }

    {
        let mut taken: HashSet<&str> = existing.iter().map(String::as_str).collect();
        for path in &planned {
            if !taken.insert(path.as_str()) {
                return Err(AppError::Conflict(format!(
                    "Photo {} is already attached to item {}",
                    path, item_id
                )));
            }
        }
    }

    Ok(planned)
}

/// Writes uploaded photos to the media area and records them on the item
pub struct PhotoAssociationService {
    media: Arc<MediaStorage>,
}

impl PhotoAssociationService {
    pub fn new(media: Arc<MediaStorage>) -> Self {
        Self { media }
    }

    /// Attach `uploads` to an existing item.
    ///
    /// Runs on the caller's connection (normally inside the transaction that
    /// saved the item). With no uploads nothing is read or written. If any
    /// step fails, files written by this call are removed again before the
    /// error is returned; once this returns `Ok`, cleanup after a failed
    /// commit is up to the caller via `outcome.added`.
    pub async fn attach(
        &self,
        conn: &mut PgConnection,
        item_id: i64,
        uploads: &[UploadedFile],
    ) -> Result<PhotoAttachOutcome> {
        if uploads.is_empty() {
            return Ok(PhotoAttachOutcome::default());
        }

        // Row lock serializes concurrent uploads to the same item
        let locked = sqlx::query_scalar::<_, i64>("SELECT id FROM items WHERE id = $1 FOR UPDATE")
            .bind(item_id)
            .fetch_optional(&mut *conn)
            .await?;
        if locked.is_none() {
            return Err(AppError::NotFound(format!(
                "Item with id {} not found",
                item_id
            )));
        }

        let existing = load_photo_paths(&mut *conn, item_id).await?;
        let planned = plan_photo_paths(item_id, &existing, uploads)?;

        let mut written = Vec::with_capacity(planned.len());
        for (path, upload) in planned.iter().zip(uploads) {
            if let Err(e) = self.media.write(path, &upload.data).await {
                warn!("Failed to write photo {} for item {}: {}", path, item_id, e);
                self.media.remove_all(&written).await;
                return Err(AppError::Io(e));
            }
            written.push(path.clone());
        }

        if let Err(e) = persist_photo_paths(&mut *conn, item_id, &written).await {
            self.media.remove_all(&written).await;
            return Err(e);
        }

        info!("Attached {} photo(s) to item {}", written.len(), item_id);
        Ok(PhotoAttachOutcome {
            added: written,
            persisted: true,
        })
    }
}

/// Photo paths of one item in display order
pub(crate) async fn load_photo_paths(conn: &mut PgConnection, item_id: i64) -> Result<Vec<String>> {
    Ok(sqlx::query_scalar::<_, String>(
        "SELECT path FROM item_photos WHERE item_id = $1 ORDER BY position, id",
    )
    .bind(item_id)
    .fetch_all(conn)
    .await?)
}

/// Append paths after the item's current last position, as a single insert
async fn persist_photo_paths(conn: &mut PgConnection, item_id: i64, paths: &[String]) -> Result<()> {
    sqlx::query(
        "INSERT INTO item_photos (item_id, path, position) \
         SELECT $1, p.path, \
                (COALESCE((SELECT MAX(position) FROM item_photos WHERE item_id = $1), -1) + p.ord)::int \
         FROM UNNEST($2::text[]) WITH ORDINALITY AS p(path, ord)",
    )
    .bind(item_id)
    .bind(paths)
    .execute(conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return AppError::Conflict(format!(
                    "A photo with the same name is already attached to item {}",
                    item_id
                ));
            }
        }
        AppError::Database(e)
    })?;

    Ok(())
}
