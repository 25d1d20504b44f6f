//! Local filesystem media storage
//!
//! Stored paths are relative to the media root and always take the form
//! `{kind_dir}/{owner_id}-{filename}`, e.g. `photos/12-a.jpg`.

use std::io;
use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Subdirectory of the media root an upload belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    CategoryIcon,
    Avatar,
    Photo,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::CategoryIcon, MediaKind::Avatar, MediaKind::Photo];

    pub fn dir(&self) -> &'static str {
        match self {
            MediaKind::CategoryIcon => "category_icons",
            MediaKind::Avatar => "avatars",
            MediaKind::Photo => "photos",
        }
    }

    /// Relative path for a file owned by the given row
    pub fn path_for(&self, owner_id: i64, filename: &str) -> String {
        format!("{}/{}-{}", self.dir(), owner_id, filename)
    }
}

/// Bytes written beside a stored path, waiting to replace it
#[derive(Debug)]
pub struct StagedFile {
    temp: PathBuf,
    target: PathBuf,
    relative: String,
    len: usize,
}

impl StagedFile {
    pub fn relative(&self) -> &str {
        &self.relative
    }
}

/// Media area rooted at a local directory
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the media root and its `avatars/`, `photos/` and `category_icons/` subdirectories
    pub async fn ensure_layout(&self) -> io::Result<()> {
        for kind in MediaKind::ALL {
            fs::create_dir_all(self.root.join(kind.dir())).await?;
        }
        info!("Media root ready at {}", self.root.display());
        Ok(())
    }

    /// Map a stored relative path to a location under the root.
    /// Absolute paths and `..` components are refused.
    fn resolve(&self, relative: &str) -> io::Result<PathBuf> {
        let rel = Path::new(relative);
        let only_normal = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if relative.is_empty() || !only_normal {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("media path escapes the media root: {}", relative),
            ));
        }
        Ok(self.root.join(rel))
    }

    /// Write `data` in full to `relative`, replacing any existing file.
    ///
    /// The bytes land in a staged temp file first and are renamed into
    /// place, so readers never observe a partially written file.
    pub async fn write(&self, relative: &str, data: &[u8]) -> io::Result<()> {
        let staged = self.stage(relative, data).await?;
        self.promote(staged).await
    }

    /// Write `data` next to `relative` without touching the file there.
    ///
    /// The temp name is dot-prefixed, so it never matches a stored path
    /// (those start with the owner id).
    pub async fn stage(&self, relative: &str, data: &[u8]) -> io::Result<StagedFile> {
        let target = self.resolve(relative)?;
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&parent).await?;

        let temp = parent.join(format!(".{}.part", Uuid::now_v7()));
        if let Err(e) = fs::write(&temp, data).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }

        Ok(StagedFile {
            temp,
            target,
            relative: relative.to_string(),
            len: data.len(),
        })
    }

    /// Move a staged file over its target
    pub async fn promote(&self, staged: StagedFile) -> io::Result<()> {
        if let Err(e) = fs::rename(&staged.temp, &staged.target).await {
            let _ = fs::remove_file(&staged.temp).await;
            return Err(e);
        }
        debug!("Media written: {} ({} bytes)", staged.relative, staged.len);
        Ok(())
    }

    /// Drop a staged file; the target keeps its current contents
    pub async fn discard(&self, staged: StagedFile) {
        match fs::remove_file(&staged.temp).await {
            Ok(()) => debug!("Staged media discarded: {}", staged.relative),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove staged file for {}: {}",
                staged.relative, e
            ),
        }
    }

    /// Remove a stored file; a file that is already gone is not an error
    pub async fn remove(&self, relative: &str) -> io::Result<()> {
        let target = self.resolve(relative)?;
        match fs::remove_file(&target).await {
            Ok(()) => {
                debug!("Media removed: {}", relative);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Best-effort removal used to clean up after a failed save
    pub async fn remove_all(&self, paths: &[String]) {
        for path in paths {
            if let Err(e) = self.remove(path).await {
                warn!("Failed to remove orphaned media file {}: {}", path, e);
            }
        }
    }

    pub async fn exists(&self, relative: &str) -> bool {
        match self.resolve(relative) {
            Ok(target) => fs::try_exists(target).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
