use std::sync::Arc;

use sqlx::PgPool;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::admin::dtos::{CategoryForm, ItemForm, AVATAR_FIELD, ICON_FIELD};
use crate::features::categories::dtos::CategoryResponseDto;
use crate::features::categories::services::category_service::{
    self, find_category_for_update, insert_category, set_category_icon, update_category,
};
use crate::features::items::dtos::ItemResponseDto;
use crate::features::items::services::item_service::{
    self, find_item_for_update, insert_item, load_item, set_item_avatar, update_item,
};
use crate::features::items::services::PhotoAssociationService;
use crate::modules::storage::{MediaKind, MediaStorage, StagedFile};
use crate::shared::constants::MAX_MEDIA_PATH_LEN;
use crate::shared::types::UploadedFile;
use crate::shared::validation::sanitize_upload_filename;

/// Media files touched by one form save
#[derive(Debug, Default)]
struct StagedMedia {
    /// New files; removed again if the save does not commit
    written: Vec<String>,
    /// Files the saved row no longer references; removed after commit
    released: Vec<String>,
    /// Same-name re-uploads; moved over the live file only after commit
    replacements: Vec<StagedFile>,
}

/// Service behind the admin form: saves a row and its uploads together
pub struct AdminService {
    pool: PgPool,
    media: Arc<MediaStorage>,
    photos: PhotoAssociationService,
    max_file_size: usize,
}

impl AdminService {
    pub fn new(pool: PgPool, media: Arc<MediaStorage>, max_file_size: usize) -> Self {
        Self {
            pool,
            photos: PhotoAssociationService::new(Arc::clone(&media)),
            media,
            max_file_size,
        }
    }

    /// Per-file upload limit applied while reading form bodies
    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Save a category form; `id` is `None` for the add form
    pub async fn save_category(
        &self,
        id: Option<i64>,
        form: CategoryForm,
    ) -> Result<CategoryResponseDto> {
        form.input.validate()?;

        let mut staged = StagedMedia::default();
        match self.save_category_tx(id, form, &mut staged).await {
            Ok(category) => {
                self.finish(staged).await;
                Ok(category)
            }
            Err(e) => {
                self.roll_back(staged).await;
                Err(e)
            }
        }
    }

    async fn save_category_tx(
        &self,
        id: Option<i64>,
        form: CategoryForm,
        staged: &mut StagedMedia,
    ) -> Result<CategoryResponseDto> {
        let mut tx = self.pool.begin().await?;

        let (mut category, previous_icon) = match id {
            None => (insert_category(&mut tx, &form.input).await?, None),
            Some(id) => {
                let current = find_category_for_update(&mut tx, id)
                    .await?
                    .ok_or_else(|| category_service::not_found(id))?;
                let updated = update_category(&mut tx, id, &form.input)
                    .await?
                    .ok_or_else(|| category_service::not_found(id))?;
                (updated, current.icon)
            }
        };

        if let Some(icon) = &form.icon {
            let path = self
                .store_single(
                    MediaKind::CategoryIcon,
                    category.id,
                    ICON_FIELD,
                    icon,
                    previous_icon,
                    staged,
                )
                .await?;
            category = set_category_icon(&mut tx, category.id, Some(&path)).await?;
        } else if form.clear_icon && previous_icon.is_some() {
            staged.released.extend(previous_icon);
            category = set_category_icon(&mut tx, category.id, None).await?;
        }

        tx.commit().await?;
        info!(
            "Category saved from admin form: id={}, icon={:?}",
            category.id, category.icon
        );

        Ok(category.into())
    }

    /// Save an item form; `id` is `None` for the add form.
    ///
    /// Photo uploads are appended through [`PhotoAssociationService`] inside
    /// the same transaction as the row itself.
    pub async fn save_item(&self, id: Option<i64>, form: ItemForm) -> Result<ItemResponseDto> {
        form.input.check()?;

        let mut staged = StagedMedia::default();
        match self.save_item_tx(id, form, &mut staged).await {
            Ok(item) => {
                self.finish(staged).await;
                Ok(item)
            }
            Err(e) => {
                self.roll_back(staged).await;
                Err(e)
            }
        }
    }

    async fn save_item_tx(
        &self,
        id: Option<i64>,
        form: ItemForm,
        staged: &mut StagedMedia,
    ) -> Result<ItemResponseDto> {
        let mut tx = self.pool.begin().await?;

        let (item, previous_avatar) = match id {
            None => (insert_item(&mut tx, &form.input).await?, None),
            Some(id) => {
                let current = find_item_for_update(&mut tx, id)
                    .await?
                    .ok_or_else(|| item_service::not_found(id))?;
                let updated = update_item(&mut tx, id, &form.input)
                    .await?
                    .ok_or_else(|| item_service::not_found(id))?;
                (updated, current.avatar_photo)
            }
        };
        let item_id = item.id;

        if let Some(avatar) = &form.avatar_photo {
            let path = self
                .store_single(
                    MediaKind::Avatar,
                    item_id,
                    AVATAR_FIELD,
                    avatar,
                    previous_avatar,
                    staged,
                )
                .await?;
            set_item_avatar(&mut tx, item_id, Some(&path)).await?;
        } else if form.clear_avatar_photo && previous_avatar.is_some() {
            staged.released.extend(previous_avatar);
            set_item_avatar(&mut tx, item_id, None).await?;
        }

        let outcome = self
            .photos
            .attach(&mut tx, item_id, &form.photo_uploads)
            .await?;
        staged.written.extend(outcome.added.iter().cloned());
        debug!(
            "Item {} photo uploads: added={}, persisted={}",
            item_id,
            outcome.added.len(),
            outcome.persisted
        );

        let dto = load_item(&mut tx, item_id)
            .await?
            .ok_or_else(|| item_service::not_found(item_id))?;
        tx.commit().await?;
        info!(
            "Item saved from admin form: id={}, photos={}",
            dto.id,
            dto.photos.len()
        );

        Ok(dto)
    }

    /// Apply staged media once the save committed
    async fn finish(&self, staged: StagedMedia) {
        for replacement in staged.replacements {
            let path = replacement.relative().to_string();
            if let Err(e) = self.media.promote(replacement).await {
                warn!("Failed to replace media file {}: {}", path, e);
            }
        }
        self.media.remove_all(&staged.released).await;
    }

    /// Undo staged media after a failed save
    async fn roll_back(&self, staged: StagedMedia) {
        for replacement in staged.replacements {
            self.media.discard(replacement).await;
        }
        self.media.remove_all(&staged.written).await;
    }

    /// Write a single-file upload (icon or avatar) to `{kind}/{owner_id}-{filename}`.
    ///
    /// A re-upload under the same name is staged and replaces the live file
    /// only after commit; any other previous file is released once the save
    /// commits.
    async fn store_single(
        &self,
        kind: MediaKind,
        owner_id: i64,
        field: &str,
        upload: &UploadedFile,
        previous: Option<String>,
        staged: &mut StagedMedia,
    ) -> Result<String> {
        let name = sanitize_upload_filename(&upload.file_name).ok_or_else(|| {
            AppError::field(
                field,
                format!("\"{}\" is not a usable file name", upload.file_name),
            )
        })?;
        let path = kind.path_for(owner_id, &name);
        if path.len() > MAX_MEDIA_PATH_LEN {
            return Err(AppError::field(
                field,
                format!("file name \"{}\" is too long", name),
            ));
        }

        if previous.as_deref() == Some(path.as_str()) {
            let replacement = self.media.stage(&path, &upload.data).await?;
            staged.replacements.push(replacement);
        } else {
            self.media.write(&path, &upload.data).await?;
            staged.written.push(path.clone());
            staged.released.extend(previous);
        }

        Ok(path)
    }
}
