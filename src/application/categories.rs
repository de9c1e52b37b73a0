use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{
    CategoriesRepo, CategoriesWriteRepo, CreateCategoryParams, RepoError, UpdateCategoryParams,
};
use crate::application::viewer::Viewer;
use crate::cache::{CacheInvalidator, CachedListings, EntityType};
use crate::domain::categories::{
    CategoryNode, CategoryTreeError, build_category_forest, build_category_subtree,
    ensure_depth_allowed, ensure_parent_allowed, path_depth,
};
use crate::domain::entities::{CategoryId, CategoryRecord, UserId};
use crate::domain::error::DomainError;
use crate::domain::title::normalize_title;

const SOURCE: &str = "application::categories";

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("authentication required")]
    Unauthenticated,
    #[error("only the author may modify this category")]
    Forbidden,
    #[error("invalid `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("invalid category hierarchy: {0}")]
    Tree(#[from] CategoryTreeError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<DomainError> for CategoryError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation { field, message } => {
                CategoryError::Validation { field, message }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateCategoryCommand {
    pub title: String,
    pub parent_id: Option<CategoryId>,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateCategoryCommand {
    pub title: Option<String>,
    /// `Some(None)` moves the category to the top level.
    pub parent_id: Option<Option<CategoryId>>,
}

#[derive(Clone)]
pub struct CategoryService {
    reader: Arc<dyn CategoriesRepo>,
    writer: Arc<dyn CategoriesWriteRepo>,
    listings: CachedListings,
    invalidator: CacheInvalidator,
}

impl CategoryService {
    pub fn new(
        reader: Arc<dyn CategoriesRepo>,
        writer: Arc<dyn CategoriesWriteRepo>,
        listings: CachedListings,
        invalidator: CacheInvalidator,
    ) -> Self {
        Self {
            reader,
            writer,
            listings,
            invalidator,
        }
    }

    /// Every category arranged as a forest, read through the cache.
    pub async fn list_tree(&self) -> Result<Vec<CategoryNode>, CategoryError> {
        let reader = self.reader.clone();
        self.listings
            .get_or_load(EntityType::Category, || async move {
                let records = reader.list_categories().await?;
                Ok::<_, CategoryError>(build_category_forest(records)?)
            })
            .await
    }

    /// The category with its full descendant subtree.
    pub async fn get_tree(&self, id: CategoryId) -> Result<CategoryNode, CategoryError> {
        let root = self.require(id, "category").await?;
        let records = self.reader.list_subtree(&root).await?;
        Ok(build_category_subtree(records, root.id)?)
    }

    pub async fn create(
        &self,
        viewer: Viewer,
        command: CreateCategoryCommand,
    ) -> Result<CategoryRecord, CategoryError> {
        let author_id = viewer.user_id().ok_or(CategoryError::Unauthenticated)?;
        let title = normalize_title(&command.title)?;

        if let Some(parent_id) = command.parent_id {
            let parent = self.require(parent_id, "parent").await?;
            ensure_depth_allowed(Some(&parent.path), 1)?;
        }

        let category = self
            .writer
            .create_category(CreateCategoryParams {
                title,
                parent_id: command.parent_id,
                author_id,
            })
            .await?;

        self.invalidator.entity_written(EntityType::Category).await;
        info!(
            target_module = SOURCE,
            category_id = category.id,
            author_id,
            parent_id = ?category.parent_id,
            "Category created"
        );
        Ok(category)
    }

    pub async fn update(
        &self,
        viewer: Viewer,
        id: CategoryId,
        command: UpdateCategoryCommand,
    ) -> Result<CategoryRecord, CategoryError> {
        let user_id = viewer.user_id().ok_or(CategoryError::Unauthenticated)?;
        let existing = self.require(id, "category").await?;
        ensure_author(&existing, user_id)?;

        let title = match command.title {
            Some(raw) => normalize_title(&raw)?,
            None => existing.title.clone(),
        };

        let parent_id = command.parent_id.unwrap_or(existing.parent_id);
        if parent_id != existing.parent_id {
            self.ensure_move_allowed(&existing, parent_id).await?;
        }

        let category = self
            .writer
            .update_category(UpdateCategoryParams {
                id,
                title,
                parent_id,
            })
            .await?;

        self.invalidator.entity_written(EntityType::Category).await;
        info!(
            target_module = SOURCE,
            category_id = id,
            parent_id = ?category.parent_id,
            moved = category.parent_id != existing.parent_id,
            "Category updated"
        );
        Ok(category)
    }

    /// Delete the category together with its descendants and their posts.
    pub async fn delete(&self, viewer: Viewer, id: CategoryId) -> Result<(), CategoryError> {
        let user_id = viewer.user_id().ok_or(CategoryError::Unauthenticated)?;
        let existing = self.require(id, "category").await?;
        ensure_author(&existing, user_id)?;

        self.writer.delete_category(id).await?;

        self.invalidator.entity_written(EntityType::Category).await;
        info!(target_module = SOURCE, category_id = id, "Category deleted");
        Ok(())
    }

    async fn ensure_move_allowed(
        &self,
        node: &CategoryRecord,
        parent_id: Option<CategoryId>,
    ) -> Result<(), CategoryError> {
        let parent = match parent_id {
            Some(parent_id) => Some(self.require(parent_id, "parent").await?),
            None => None,
        };

        if let Some(parent) = &parent {
            ensure_parent_allowed(node, parent)?;
        }

        let base_depth = path_depth(&node.path);
        let height = self
            .reader
            .list_subtree(node)
            .await?
            .iter()
            .map(|record| path_depth(&record.path).saturating_sub(base_depth) + 1)
            .max()
            .unwrap_or(1);

        ensure_depth_allowed(parent.as_ref().map(|p| p.path.as_str()), height)?;
        Ok(())
    }

    async fn require(
        &self,
        id: CategoryId,
        entity: &'static str,
    ) -> Result<CategoryRecord, CategoryError> {
        self.reader
            .find_category(id)
            .await?
            .ok_or(CategoryError::NotFound { entity })
    }
}

fn ensure_author(category: &CategoryRecord, user_id: UserId) -> Result<(), CategoryError> {
    if category.author_id == user_id {
        Ok(())
    } else {
        Err(CategoryError::Forbidden)
    }
}
