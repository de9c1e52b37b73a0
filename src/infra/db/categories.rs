use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;

use crate::{
    application::repos::{
        CategoriesRepo, CategoriesWriteRepo, CreateCategoryParams, RepoError,
        UpdateCategoryParams,
    },
    domain::categories::{child_path, is_within},
    domain::entities::{CategoryId, CategoryRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    title: String,
    parent_id: Option<i64>,
    path: String,
    author_id: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            parent_id: row.parent_id,
            path: row.path,
            author_id: row.author_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

async fn parent_path(
    tx: &mut Transaction<'_, Postgres>,
    parent_id: Option<CategoryId>,
) -> Result<Option<String>, RepoError> {
    let Some(parent_id) = parent_id else {
        return Ok(None);
    };

    let path = sqlx::query_scalar::<_, String>(
        "SELECT path FROM categories WHERE id = $1 FOR SHARE",
    )
    .bind(parent_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(map_sqlx_error)?
    .ok_or(RepoError::NotFound)?;

    Ok(Some(path))
}

#[async_trait]
impl CategoriesRepo for PostgresRepositories {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, title, parent_id, path, author_id, created_at, updated_at
            FROM categories
            ORDER BY path
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CategoryRecord::from).collect())
    }

    async fn find_category(&self, id: CategoryId) -> Result<Option<CategoryRecord>, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, title, parent_id, path, author_id, created_at, updated_at
            FROM categories
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CategoryRecord::from))
    }

    async fn list_subtree(&self, root: &CategoryRecord) -> Result<Vec<CategoryRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, title, parent_id, path, author_id, created_at, updated_at
            FROM categories
            WHERE path LIKE $1 || '%'
            ORDER BY path
            "#,
        )
        .bind(&root.path)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CategoryRecord::from).collect())
    }
}

#[async_trait]
impl CategoriesWriteRepo for PostgresRepositories {
    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let parent_path = parent_path(&mut tx, params.parent_id).await?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO categories (title, parent_id, author_id)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&params.title)
        .bind(params.parent_id)
        .bind(params.author_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            UPDATE categories
            SET path = $2
            WHERE id = $1
            RETURNING id, title, parent_id, path, author_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(child_path(parent_path.as_deref(), id))
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn update_category(
        &self,
        params: UpdateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let current = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, title, parent_id, path, author_id, created_at, updated_at
            FROM categories
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(params.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        if current.parent_id != params.parent_id {
            let parent_path = parent_path(&mut tx, params.parent_id).await?;
            if parent_path
                .as_deref()
                .is_some_and(|path| is_within(path, &current.path))
            {
                return Err(RepoError::InvalidInput {
                    message: format!(
                        "category {} cannot be moved below its own subtree",
                        params.id
                    ),
                });
            }

            let new_path = child_path(parent_path.as_deref(), params.id);
            sqlx::query(
                r#"
                UPDATE categories
                SET path = $2 || substr(path, char_length($1) + 1)
                WHERE path LIKE $1 || '%'
                "#,
            )
            .bind(&current.path)
            .bind(&new_path)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            UPDATE categories
            SET title = $2, parent_id = $3, updated_at = now()
            WHERE id = $1
            RETURNING id, title, parent_id, path, author_id, created_at, updated_at
            "#,
        )
        .bind(params.id)
        .bind(&params.title)
        .bind(params.parent_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), RepoError> {
        // Descendants and their posts go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
