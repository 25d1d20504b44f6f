//! Storage module for uploaded media
//!
//! Provides the local media area that category icons, item avatars and
//! item photos are written to and served from.

mod media_storage;

pub use media_storage::{MediaKind, MediaStorage, StagedFile};
