use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::features::categories::models::Category;
use crate::shared::validation::deserialize_trimmed;

/// Abbreviated projection used by the category list endpoint.
/// Always exactly `{id, name, icon}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryListItemDto {
    pub id: i64,
    pub name: String,
    /// Media path of the icon, e.g. `category_icons/3-food.png`
    pub icon: Option<String>,
}

impl From<Category> for CategoryListItemDto {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
            icon: c.icon,
        }
    }
}

/// Full category representation returned by retrieve/create/update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponseDto {
    pub id: i64,
    pub name: String,
    pub icon: Option<String>,
}

impl From<Category> for CategoryResponseDto {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
            icon: c.icon,
        }
    }
}

/// Writable category fields (POST and PUT body).
///
/// `icon` is set through the admin form upload and ignored here.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate, ToSchema)]
pub struct CategoryInput {
    #[serde(deserialize_with = "deserialize_trimmed")]
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    #[schema(example = "Restaurants")]
    pub name: String,
}

/// PATCH body: every field optional
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PatchCategoryDto {
    pub name: Option<String>,
}

impl PatchCategoryDto {
    /// Merge onto the current values; the result still needs validating
    pub fn apply_to(self, current: &Category) -> CategoryInput {
        CategoryInput {
            name: self
                .name
                .map(|name| name.trim().to_string())
                .unwrap_or_else(|| current.name.clone()),
        }
    }
}
