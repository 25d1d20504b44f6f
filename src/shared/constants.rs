/// Image MIME types accepted for icons, avatars and item photos
pub const ALLOWED_IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Check if a MIME type is an accepted image type
pub fn is_image_mime_type(content_type: &str) -> bool {
    ALLOWED_IMAGE_MIME_TYPES.contains(&content_type)
}

/// Maximum length of a stored media path (matches the VARCHAR columns)
pub const MAX_MEDIA_PATH_LEN: usize = 255;
