use serde_json::Value as JsonValue;
use sqlx::FromRow;

/// Database model for item (a directory listing)
#[derive(Debug, Clone, FromRow)]
pub struct Item {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub working_hours: JsonValue,
    pub whatsapp_number: Option<String>,
    pub phone_numbers: Option<String>,
    pub avatar_photo: Option<String>,
}
