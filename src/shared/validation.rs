use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer};

lazy_static! {
    /// Regex for uploaded file names once reduced to their last path component
    /// Must not contain path separators or control characters
    /// - Valid: "a.jpg", "front door.png", "menu-2024.webp"
    /// - Invalid: "dir/a.jpg", "a\\b.jpg", "tab\there.png", ""
    pub static ref UPLOAD_FILENAME_REGEX: Regex =
        Regex::new(r"^[^/\\\x00-\x1f\x7f]+$").unwrap();
}

/// Reduce a client-supplied file name to a safe single path component
///
/// Returns `None` when nothing usable is left (empty, `.`, `..`).
pub fn sanitize_upload_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    if !UPLOAD_FILENAME_REGEX.is_match(last) {
        return None;
    }
    Some(last.to_string())
}

/// Serde helper for required text: surrounding whitespace is dropped, so a
/// blank value fails the length check the same way it does in the admin form
pub fn deserialize_trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|s| s.trim().to_string())
}
