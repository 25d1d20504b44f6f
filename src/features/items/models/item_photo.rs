use sqlx::FromRow;

/// Database model for a photo attached to an item
#[derive(Debug, Clone, FromRow)]
pub struct ItemPhoto {
    pub id: i64,
    pub item_id: i64,
    /// Media path, `photos/{item_id}-{filename}`
    pub path: String,
    pub position: i32,
}
