use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::core::error::{AppError, Result as AppResult};
use crate::features::items::models::Item;
use crate::shared::types::FieldErrors;
use crate::shared::validation::deserialize_trimmed;

fn empty_object() -> JsonValue {
    JsonValue::Object(Default::default())
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Full item representation.
///
/// Field names match the stored attributes one-to-one; `category` carries
/// the category id and `photos` lists media paths in upload order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemResponseDto {
    pub id: i64,
    pub category: i64,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Opaque JSON value, `{}` when never set
    #[serde(default = "empty_object")]
    #[schema(value_type = Object)]
    pub working_hours: JsonValue,
    pub whatsapp_number: Option<String>,
    pub phone_numbers: Option<String>,
    /// Media path under `avatars/`
    pub avatar_photo: Option<String>,
    /// Media paths, each `photos/{id}-{filename}`
    #[serde(default)]
    pub photos: Vec<String>,
}

impl ItemResponseDto {
    pub fn from_parts(item: Item, photos: Vec<String>) -> Self {
        Self {
            id: item.id,
            category: item.category_id,
            name: item.name,
            description: item.description,
            address: item.address,
            latitude: item.latitude,
            longitude: item.longitude,
            working_hours: item.working_hours,
            whatsapp_number: item.whatsapp_number,
            phone_numbers: item.phone_numbers,
            avatar_photo: item.avatar_photo,
            photos,
        }
    }
}

/// Writable item fields (POST and PUT body, and the validated admin form).
///
/// `avatar_photo` and `photos` are read-only here; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate, ToSchema)]
pub struct ItemInput {
    /// Id of an existing category
    pub category: i64,

    #[serde(deserialize_with = "deserialize_trimmed")]
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    #[schema(example = "Cafe X")]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(deserialize_with = "deserialize_trimmed")]
    #[validate(length(min = 1, max = 255, message = "address must be between 1 and 255 characters"))]
    #[schema(example = "1 Main St")]
    pub address: String,

    #[validate(range(min = -90.0, max = 90.0, message = "latitude must be between -90 and 90"))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0, message = "longitude must be between -180 and 180"))]
    pub longitude: f64,

    #[serde(default = "empty_object")]
    #[schema(value_type = Object)]
    pub working_hours: JsonValue,

    #[serde(default)]
    #[validate(length(max = 20, message = "whatsapp_number must be at most 20 characters"))]
    pub whatsapp_number: Option<String>,

    #[serde(default)]
    #[validate(length(max = 255, message = "phone_numbers must be at most 255 characters"))]
    pub phone_numbers: Option<String>,
}

impl ItemInput {
    /// Field validation plus the checks the derive cannot express
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        if self.working_hours.is_null() {
            let mut err = ValidationError::new("null");
            err.message = Some("working_hours may not be null".into());
            errors.add("working_hours", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl From<&Item> for ItemInput {
    fn from(item: &Item) -> Self {
        Self {
            category: item.category_id,
            name: item.name.clone(),
            description: item.description.clone(),
            address: item.address.clone(),
            latitude: item.latitude,
            longitude: item.longitude,
            working_hours: item.working_hours.clone(),
            whatsapp_number: item.whatsapp_number.clone(),
            phone_numbers: item.phone_numbers.clone(),
        }
    }
}

/// PATCH body. Absent fields keep their value; only nullable fields accept
/// `null`, the rest report it as a field error from [`PatchItemDto::apply_to`].
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PatchItemDto {
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<i64>)]
    pub category: Option<Option<i64>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>)]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>)]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<f64>)]
    pub latitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<f64>)]
    pub longitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<Object>)]
    pub working_hours: Option<JsonValue>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>)]
    pub whatsapp_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>)]
    pub phone_numbers: Option<Option<String>>,
}

const MAY_NOT_BE_NULL: &str = "This field may not be null.";

/// Value for a non-nullable field: absent keeps `current`, `null` is an error
fn non_null<T>(
    field: &str,
    value: Option<Option<T>>,
    current: T,
    errors: &mut FieldErrors,
) -> T {
    match value {
        None => current,
        Some(Some(v)) => v,
        Some(None) => {
            errors
                .entry(field.to_string())
                .or_default()
                .push(MAY_NOT_BE_NULL.to_string());
            current
        }
    }
}

impl PatchItemDto {
    /// Merge onto the current values; the result still needs validating
    pub fn apply_to(self, current: ItemInput) -> AppResult<ItemInput> {
        let mut errors = FieldErrors::new();
        let merged = ItemInput {
            category: non_null("category", self.category, current.category, &mut errors),
            name: non_null("name", self.name, current.name, &mut errors)
                .trim()
                .to_string(),
            description: self.description.unwrap_or(current.description),
            address: non_null("address", self.address, current.address, &mut errors)
                .trim()
                .to_string(),
            latitude: non_null("latitude", self.latitude, current.latitude, &mut errors),
            longitude: non_null("longitude", self.longitude, current.longitude, &mut errors),
            working_hours: self.working_hours.unwrap_or(current.working_hours),
            whatsapp_number: self.whatsapp_number.unwrap_or(current.whatsapp_number),
            phone_numbers: self.phone_numbers.unwrap_or(current.phone_numbers),
        };

        if errors.is_empty() {
            Ok(merged)
        } else {
            Err(AppError::Validation(errors))
        }
    }
}
