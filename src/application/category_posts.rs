use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::application::pagination::{PaginationError, PaginationLimits};
use crate::application::repos::{
    CategoriesRepo, PostVisibility, PostsRepo, ReactionsRepo, RepoError,
};
use crate::application::viewer::Viewer;
use crate::domain::categories::{CategoryNode, CategoryTreeError, build_category_subtree};
use crate::domain::entities::{CategoryId, PostId, PostRecord};

const SOURCE: &str = "application::category_posts";

#[derive(Debug, Error)]
pub enum CategoryPostsError {
    #[error("category not found")]
    CategoryNotFound,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error("invalid category hierarchy: {0}")]
    Tree(#[from] CategoryTreeError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Raw paging inputs as they arrive on the query string.
#[derive(Debug, Clone, Default)]
pub struct CategoryPostsQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: PostRecord,
    pub is_favorite: bool,
    pub is_liked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryPostsPage {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub category: CategoryNode,
    pub results: Vec<PostView>,
}

#[derive(Clone)]
pub struct CategoryPostsService {
    categories: Arc<dyn CategoriesRepo>,
    posts: Arc<dyn PostsRepo>,
    reactions: Arc<dyn ReactionsRepo>,
    limits: PaginationLimits,
}

impl CategoryPostsService {
    pub fn new(
        categories: Arc<dyn CategoriesRepo>,
        posts: Arc<dyn PostsRepo>,
        reactions: Arc<dyn ReactionsRepo>,
        limits: PaginationLimits,
    ) -> Self {
        Self {
            categories,
            posts,
            reactions,
            limits,
        }
    }

    pub async fn page(
        &self,
        viewer: Viewer,
        category_id: CategoryId,
        query: &CategoryPostsQuery,
    ) -> Result<CategoryPostsPage, CategoryPostsError> {
        let category = self
            .categories
            .find_category(category_id)
            .await?
            .ok_or(CategoryPostsError::CategoryNotFound)?;

        let request = self.limits.resolve(
            query.page.as_deref(),
            query.page_size.as_deref(),
            query.cursor.as_deref(),
        )?;

        let subtree_records = self.categories.list_subtree(&category).await?;
        let subtree = build_category_subtree(subtree_records, category.id)?;

        let visibility = match viewer {
            Viewer::Anonymous => PostVisibility::Public,
            Viewer::User(user_id) => PostVisibility::PublicOrAuthoredBy(user_id),
        };

        let count = self
            .posts
            .count_in_category(category.id, visibility)
            .await?;
        let page = request.bind(count)?;

        let records = self
            .posts
            .list_in_category(category.id, visibility, page.limit(), page.offset())
            .await?;
        let results = self.annotate(viewer, records).await?;

        debug!(
            target_module = SOURCE,
            category_id = category.id,
            page = page.page(),
            count,
            returned = results.len(),
            subtree_size = subtree.subtree_size(),
            "Category posts page assembled"
        );

        Ok(CategoryPostsPage {
            count: page.count(),
            next: page.next_cursor(),
            previous: page.previous_cursor(),
            category: subtree,
            results,
        })
    }

    /// Attach favorite/like flags, looking up only the ids on this page.
    async fn annotate(
        &self,
        viewer: Viewer,
        records: Vec<PostRecord>,
    ) -> Result<Vec<PostView>, CategoryPostsError> {
        let user_id = match viewer.user_id() {
            Some(user_id) if !records.is_empty() => user_id,
            _ => return Ok(records.into_iter().map(unflagged).collect()),
        };

        let ids: Vec<PostId> = records.iter().map(|post| post.id).collect();
        let favorites: HashSet<PostId> = self
            .reactions
            .favorite_post_ids(user_id, &ids)
            .await?
            .into_iter()
            .collect();
        let liked: HashSet<PostId> = self
            .reactions
            .liked_post_ids(user_id, &ids)
            .await?
            .into_iter()
            .collect();

        Ok(records
            .into_iter()
            .map(|post| PostView {
                is_favorite: favorites.contains(&post.id),
                is_liked: liked.contains(&post.id),
                post,
            })
            .collect())
    }
}

fn unflagged(post: PostRecord) -> PostView {
    PostView {
        post,
        is_favorite: false,
        is_liked: false,
    }
}
