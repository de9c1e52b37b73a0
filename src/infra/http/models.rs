use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::entities::CategoryId;

/// Distinguish an absent field from an explicit `null`.
fn explicit_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CategoryCreateRequest {
    pub title: String,
    #[serde(default)]
    pub parent: Option<CategoryId>,
}

/// Body of a create under a parent named in the path.
#[derive(Debug, Deserialize, Serialize)]
pub struct ChildCategoryCreateRequest {
    pub title: String,
}

/// Full update; `title` is required, `parent` is kept when omitted.
#[derive(Debug, Deserialize)]
pub struct CategoryReplaceRequest {
    pub title: String,
    #[serde(default, deserialize_with = "explicit_option")]
    pub parent: Option<Option<CategoryId>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryPatchRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "explicit_option")]
    pub parent: Option<Option<CategoryId>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryCreatedResponse {
    pub message: String,
    pub id: CategoryId,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryPostsParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub cursor: Option<String>,
}
