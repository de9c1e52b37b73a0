//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

pub type UserId = i64;
pub type CategoryId = i64;
pub type PostId = i64;

/// Visit counter for a single client address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitRecord {
    /// Canonical textual form of the address (`IpAddr` display).
    pub ip_address: String,
    pub visit_count: i64,
    pub first_seen_date: Date,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub title: String,
    pub parent_id: Option<CategoryId>,
    /// Materialized path of ancestor ids including this node, e.g. `/1/4/9/`.
    pub path: String,
    pub author_id: UserId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostAuthor {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub id: PostId,
    pub category_id: CategoryId,
    pub author: PostAuthor,
    pub title: String,
    pub body: String,
    pub is_private: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
