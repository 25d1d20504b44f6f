use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Field name -> messages, as returned in validation error bodies
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Body returned for every non-2xx response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[schema(value_type = Option<Object>)]
    pub errors: Option<FieldErrors>,
}

impl ErrorResponse {
    pub fn new(message: String, errors: Option<FieldErrors>) -> Self {
        Self {
            success: false,
            message,
            errors,
        }
    }
}

/// A file received from a multipart form, fully buffered
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name, not yet sanitized
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}
