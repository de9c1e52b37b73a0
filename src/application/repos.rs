//! Repository traits describing persistence adapters.

use std::net::IpAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Date;

use crate::domain::entities::{
    CategoryId, CategoryRecord, PostId, PostRecord, UserId, VisitRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisitTotals {
    pub unique_visitors: i64,
    pub total_visits: i64,
}

#[async_trait]
pub trait VisitorsRepo: Send + Sync {
    /// Create the record with a count of one or bump an existing count by one.
    async fn record_visit(&self, ip: IpAddr, today: Date) -> Result<VisitRecord, RepoError>;

    async fn find_visit(&self, ip: IpAddr) -> Result<Option<VisitRecord>, RepoError>;

    async fn visit_totals(&self) -> Result<VisitTotals, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateCategoryParams {
    pub title: String,
    pub parent_id: Option<CategoryId>,
    pub author_id: UserId,
}

#[derive(Debug, Clone)]
pub struct UpdateCategoryParams {
    pub id: CategoryId,
    pub title: String,
    pub parent_id: Option<CategoryId>,
}

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError>;

    async fn find_category(&self, id: CategoryId) -> Result<Option<CategoryRecord>, RepoError>;

    /// All categories whose path lies within `root`'s path, `root` included.
    async fn list_subtree(&self, root: &CategoryRecord) -> Result<Vec<CategoryRecord>, RepoError>;
}

#[async_trait]
pub trait CategoriesWriteRepo: Send + Sync {
    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError>;

    /// Persist title and parent; descendant paths follow a parent change.
    async fn update_category(
        &self,
        params: UpdateCategoryParams,
    ) -> Result<CategoryRecord, RepoError>;

    /// Remove the category together with its descendants and their posts.
    async fn delete_category(&self, id: CategoryId) -> Result<(), RepoError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostVisibility {
    Public,
    PublicOrAuthoredBy(UserId),
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn count_in_category(
        &self,
        category_id: CategoryId,
        visibility: PostVisibility,
    ) -> Result<u64, RepoError>;

    /// Posts ordered newest first, author joined.
    async fn list_in_category(
        &self,
        category_id: CategoryId,
        visibility: PostVisibility,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<PostRecord>, RepoError>;
}

#[async_trait]
pub trait ReactionsRepo: Send + Sync {
    /// Subset of `post_ids` the user has favorited.
    async fn favorite_post_ids(
        &self,
        user_id: UserId,
        post_ids: &[PostId],
    ) -> Result<Vec<PostId>, RepoError>;

    /// Subset of `post_ids` the user has liked.
    async fn liked_post_ids(
        &self,
        user_id: UserId,
        post_ids: &[PostId],
    ) -> Result<Vec<PostId>, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
