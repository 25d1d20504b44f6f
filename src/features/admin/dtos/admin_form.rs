//! Admin form bodies.
//!
//! A multipart body is first read into a [`RawForm`] (text fields plus
//! checked image uploads), then bound to a typed form. Binding only parses;
//! field rules are applied later by the input's `validate()`.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::Multipart;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;
use utoipa::ToSchema;

use crate::core::error::{AppError, Result};
use crate::features::categories::dtos::CategoryInput;
use crate::features::items::dtos::ItemInput;
use crate::features::items::services::photo_service::PHOTO_UPLOADS_FIELD;
use crate::shared::constants::{is_image_mime_type, ALLOWED_IMAGE_MIME_TYPES};
use crate::shared::types::{FieldErrors, UploadedFile};

pub const ICON_FIELD: &str = "icon";
pub const ICON_CLEAR_FIELD: &str = "icon-clear";
pub const AVATAR_FIELD: &str = "avatar_photo";
pub const AVATAR_CLEAR_FIELD: &str = "avatar_photo-clear";

const REQUIRED: &str = "This field is required.";

/// Multipart body split into text fields and image uploads
#[derive(Debug, Default)]
pub struct RawForm {
    text: HashMap<String, String>,
    files: Vec<(String, UploadedFile)>,
}

impl RawForm {
    /// Read every part of `multipart`.
    ///
    /// File inputs left empty by the browser are skipped. Uploads over
    /// `max_file_size` or with a non-image content type are rejected with a
    /// field error.
    pub async fn read(multipart: &mut Multipart, max_file_size: usize) -> Result<Self> {
        let mut form = RawForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            debug!("Failed to read multipart field: {}", e);
            AppError::BadRequest(format!("Failed to read multipart data: {}", e))
        })? {
            let name = field.name().unwrap_or("").to_string();
            if name.is_empty() {
                continue;
            }

            let Some(file_name) = field.file_name().map(|s| s.to_string()) else {
                let value = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read field {}: {}", name, e))
                })?;
                form.text.insert(name, value);
                continue;
            };

            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let data = field.bytes().await.map_err(|e| {
                debug!("Failed to read file bytes: {}", e);
                AppError::BadRequest(format!("Failed to read file data: {}", e))
            })?;

            if file_name.is_empty() && data.is_empty() {
                debug!("Skipping empty file input: {}", name);
                continue;
            }
            if data.is_empty() {
                return Err(AppError::field(&name, "The submitted file is empty."));
            }
            if data.len() > max_file_size {
                return Err(AppError::field(
                    &name,
                    format!(
                        "File too large. Maximum size is {} bytes ({} MB)",
                        max_file_size,
                        max_file_size / 1024 / 1024
                    ),
                ));
            }
            if !is_image_mime_type(&content_type) {
                return Err(AppError::field(
                    &name,
                    format!(
                        "File type '{}' is not allowed. Allowed types: {}",
                        content_type,
                        ALLOWED_IMAGE_MIME_TYPES.join(", ")
                    ),
                ));
            }

            form.files.push((
                name,
                UploadedFile {
                    file_name,
                    content_type,
                    data: data.to_vec(),
                },
            ));
        }

        Ok(form)
    }

    /// Trimmed text value; `None` when missing or blank
    fn text(&self, name: &str) -> Option<&str> {
        self.text
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn optional_text(&self, name: &str) -> Option<String> {
        self.text(name).map(str::to_string)
    }

    fn required_text(&self, name: &str, errors: &mut FieldErrors) -> Option<String> {
        let value = self.optional_text(name);
        if value.is_none() {
            add_error(errors, name, REQUIRED);
        }
        value
    }

    fn required_parsed<T: FromStr>(
        &self,
        name: &str,
        invalid: &str,
        errors: &mut FieldErrors,
    ) -> Option<T> {
        let Some(raw) = self.text(name) else {
            add_error(errors, name, REQUIRED);
            return None;
        };
        let parsed = raw.parse::<T>().ok();
        if parsed.is_none() {
            add_error(errors, name, invalid);
        }
        parsed
    }

    fn required_float(&self, name: &str, errors: &mut FieldErrors) -> Option<f64> {
        let value = self.required_parsed::<f64>(name, "A valid number is required.", errors)?;
        if !value.is_finite() {
            add_error(errors, name, "A valid number is required.");
            return None;
        }
        Some(value)
    }

    /// JSON text; a blank field means `{}`
    fn json_or_empty(&self, name: &str, errors: &mut FieldErrors) -> Option<JsonValue> {
        let Some(raw) = self.text(name) else {
            return Some(JsonValue::Object(Default::default()));
        };
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(_) => {
                add_error(errors, name, "Enter a valid JSON.");
                None
            }
        }
    }

    /// Checkbox semantics: present and not explicitly off
    fn flag(&self, name: &str) -> bool {
        self.text(name)
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "off" | "false" | "0"))
            .unwrap_or(false)
    }

    fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let index = self.files.iter().position(|(field, _)| field == name)?;
        Some(self.files.remove(index).1)
    }

    fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| field == name);
        self.files = rest;
        taken.into_iter().map(|(_, file)| file).collect()
    }
}

fn add_error(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

/// Bound category form
#[derive(Debug)]
pub struct CategoryForm {
    pub input: CategoryInput,
    pub icon: Option<UploadedFile>,
    pub clear_icon: bool,
}

impl CategoryForm {
    pub fn bind(mut raw: RawForm) -> Result<Self> {
        let mut errors = FieldErrors::new();
        let Some(name) = raw.required_text("name", &mut errors) else {
            return Err(AppError::Validation(errors));
        };

        Ok(Self {
            input: CategoryInput { name },
            icon: raw.take_file(ICON_FIELD),
            clear_icon: raw.flag(ICON_CLEAR_FIELD),
        })
    }
}

/// Bound item form
#[derive(Debug)]
pub struct ItemForm {
    pub input: ItemInput,
    pub avatar_photo: Option<UploadedFile>,
    pub clear_avatar_photo: bool,
    pub photo_uploads: Vec<UploadedFile>,
}

impl ItemForm {
    pub fn bind(mut raw: RawForm) -> Result<Self> {
        let mut errors = FieldErrors::new();

        let category =
            raw.required_parsed::<i64>("category", "A valid integer is required.", &mut errors);
        let name = raw.required_text("name", &mut errors);
        let address = raw.required_text("address", &mut errors);
        let latitude = raw.required_float("latitude", &mut errors);
        let longitude = raw.required_float("longitude", &mut errors);
        let working_hours = raw.json_or_empty("working_hours", &mut errors);

        let (
            Some(category),
            Some(name),
            Some(address),
            Some(latitude),
            Some(longitude),
            Some(working_hours),
        ) = (category, name, address, latitude, longitude, working_hours)
        else {
            return Err(AppError::Validation(errors));
        };

        Ok(Self {
            input: ItemInput {
                category,
                name,
                description: raw.optional_text("description"),
                address,
                latitude,
                longitude,
                working_hours,
                whatsapp_number: raw.optional_text("whatsapp_number"),
                phone_numbers: raw.optional_text("phone_numbers"),
            },
            avatar_photo: raw.take_file(AVATAR_FIELD),
            clear_avatar_photo: raw.flag(AVATAR_CLEAR_FIELD),
            photo_uploads: raw.take_files(PHOTO_UPLOADS_FIELD),
        })
    }
}

/// Category admin form, for Swagger UI documentation only.
/// The handlers read the multipart body directly.
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct CategoryFormDoc {
    #[schema(example = "Restaurants")]
    pub name: String,
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub icon: Option<String>,
    /// Send `on` to remove the current icon
    #[serde(rename = "icon-clear")]
    pub icon_clear: Option<String>,
}

/// Item admin form, for Swagger UI documentation only.
/// The handlers read the multipart body directly.
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct ItemFormDoc {
    pub category: i64,
    #[schema(example = "Cafe X")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "1 Main St")]
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    /// JSON text, `{}` when blank
    #[schema(example = "{\"mon\": \"09:00-18:00\"}")]
    pub working_hours: Option<String>,
    pub whatsapp_number: Option<String>,
    pub phone_numbers: Option<String>,
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub avatar_photo: Option<String>,
    /// Send `on` to remove the current avatar
    #[serde(rename = "avatar_photo-clear")]
    pub avatar_photo_clear: Option<String>,
    /// Repeat the field once per photo; photos are appended in order
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub photo_uploads: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{header, Request};
    use serde_json::json;

    const BOUNDARY: &str = "X-DIREKTORI-BOUNDARY";
    const MAX: usize = 1024;

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a str, &'a [u8]),
    }

    async fn read(parts: &[Part<'_>]) -> Result<RawForm> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, file_name, content_type, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: {}\r\n\r\n",
                            name, file_name, content_type
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/admin/items")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        let mut multipart = Multipart::from_request(request, &()).await.unwrap();
        RawForm::read(&mut multipart, MAX).await
    }

    fn field_error(err: AppError, field: &str) -> Vec<String> {
        match err {
            AppError::Validation(fields) => fields.get(field).cloned().unwrap_or_default(),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_item_form_binds_fields_and_uploads() {
        let raw = read(&[
            Part::Text("category", "4"),
            Part::Text("name", " Cafe X "),
            Part::Text("description", ""),
            Part::Text("address", "1 Main St"),
            Part::Text("latitude", "0.0"),
            Part::Text("longitude", "-0.5"),
            Part::Text("working_hours", "{\"mon\": \"09-18\"}"),
            Part::File("avatar_photo", "logo.png", "image/png", b"png"),
            Part::File("photo_uploads", "a.jpg", "image/jpeg", b"aaa"),
            Part::File("photo_uploads", "b.jpg", "image/jpeg", b"bbb"),
        ])
        .await
        .unwrap();

        let form = ItemForm::bind(raw).unwrap();
        assert_eq!(form.input.category, 4);
        assert_eq!(form.input.name, "Cafe X");
        assert_eq!(form.input.description, None);
        assert_eq!(form.input.longitude, -0.5);
        assert_eq!(form.input.working_hours, json!({"mon": "09-18"}));
        assert_eq!(form.input.whatsapp_number, None);
        assert_eq!(
            form.avatar_photo.map(|f| f.file_name),
            Some("logo.png".to_string())
        );
        assert!(!form.clear_avatar_photo);
        let names: Vec<_> = form.photo_uploads.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    }

    #[tokio::test]
    async fn test_item_form_defaults_and_skipped_empty_inputs() {
        let raw = read(&[
            Part::Text("category", "1"),
            Part::Text("name", "Cafe X"),
            Part::Text("address", "1 Main St"),
            Part::Text("latitude", "41.3"),
            Part::Text("longitude", "69.2"),
            Part::Text("working_hours", ""),
            Part::File("avatar_photo", "", "application/octet-stream", b""),
            Part::File("photo_uploads", "", "application/octet-stream", b""),
            Part::Text("avatar_photo-clear", "on"),
        ])
        .await
        .unwrap();

        let form = ItemForm::bind(raw).unwrap();
        assert_eq!(form.input.working_hours, json!({}));
        assert!(form.avatar_photo.is_none());
        assert!(form.photo_uploads.is_empty());
        assert!(form.clear_avatar_photo);
    }

    #[tokio::test]
    async fn test_item_form_reports_every_bad_field() {
        let raw = read(&[
            Part::Text("category", "abc"),
            Part::Text("latitude", "NaN"),
            Part::Text("longitude", "1"),
            Part::Text("working_hours", "{not json"),
        ])
        .await
        .unwrap();

        let err = ItemForm::bind(raw).unwrap_err();
        let AppError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields["category"], vec!["A valid integer is required."]);
        assert_eq!(fields["name"], vec![REQUIRED]);
        assert_eq!(fields["address"], vec![REQUIRED]);
        assert!(fields.contains_key("latitude"));
        assert!(!fields.contains_key("longitude"));
        assert_eq!(fields["working_hours"], vec!["Enter a valid JSON."]);
    }

    #[tokio::test]
    async fn test_category_form() {
        let raw = read(&[
            Part::Text("name", "Restaurants"),
            Part::File("icon", "fork.webp", "image/webp", b"webp"),
            Part::Text("icon-clear", "off"),
        ])
        .await
        .unwrap();

        let form = CategoryForm::bind(raw).unwrap();
        assert_eq!(form.input.name, "Restaurants");
        assert_eq!(form.icon.map(|f| f.data), Some(b"webp".to_vec()));
        assert!(!form.clear_icon);

        let raw = read(&[Part::Text("name", "  ")]).await.unwrap();
        let err = CategoryForm::bind(raw).unwrap_err();
        assert_eq!(field_error(err, "name"), vec![REQUIRED]);
    }

    #[tokio::test]
    async fn test_non_image_upload_is_rejected() {
        let err = read(&[Part::File("photo_uploads", "notes.txt", "text/plain", b"hi")])
            .await
            .unwrap_err();
        let messages = field_error(err, "photo_uploads");
        assert!(messages[0].contains("text/plain"));
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let big = vec![0u8; MAX + 1];
        let err = read(&[Part::File("icon", "big.png", "image/png", &big)])
            .await
            .unwrap_err();
        assert!(field_error(err, "icon")[0].starts_with("File too large"));
    }

    #[tokio::test]
    async fn test_named_file_without_content_is_rejected() {
        let err = read(&[Part::File("avatar_photo", "x.png", "image/png", b"")])
            .await
            .unwrap_err();
        assert_eq!(
            field_error(err, "avatar_photo"),
            vec!["The submitted file is empty."]
        );
    }
}
