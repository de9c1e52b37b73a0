use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::repos::{PostVisibility, PostsRepo, ReactionsRepo, RepoError},
    domain::entities::{CategoryId, PostAuthor, PostId, PostRecord, UserId},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    category_id: i64,
    author_id: i64,
    author_username: String,
    title: String,
    body: String,
    is_private: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            author: PostAuthor {
                id: row.author_id,
                username: row.author_username,
            },
            title: row.title,
            body: row.body,
            is_private: row.is_private,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresRepositories {
    fn apply_visibility<'q>(qb: &mut QueryBuilder<'q, Postgres>, visibility: PostVisibility) {
        match visibility {
            PostVisibility::Public => {
                qb.push(" AND p.is_private = FALSE");
            }
            PostVisibility::PublicOrAuthoredBy(user_id) => {
                qb.push(" AND (p.is_private = FALSE OR p.author_id = ");
                qb.push_bind(user_id);
                qb.push(")");
            }
        }
    }

    async fn reaction_ids(
        &self,
        table: &'static str,
        user_id: UserId,
        post_ids: &[PostId],
    ) -> Result<Vec<PostId>, RepoError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Postgres>::new("SELECT post_id FROM ");
        qb.push(table);
        qb.push(" WHERE user_id = ");
        qb.push_bind(user_id);
        qb.push(" AND post_id = ANY(");
        qb.push_bind(post_ids.to_vec());
        qb.push(")");

        qb.build_query_scalar::<i64>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_in_category(
        &self,
        category_id: CategoryId,
        visibility: PostVisibility,
    ) -> Result<u64, RepoError> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p WHERE p.category_id = ");
        qb.push_bind(category_id);
        Self::apply_visibility(&mut qb, visibility);

        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_in_category(
        &self,
        category_id: CategoryId,
        visibility: PostVisibility,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let offset = i64::try_from(offset).map_err(|_| RepoError::InvalidInput {
            message: format!("offset {offset} exceeds supported range"),
        })?;

        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT p.id, p.category_id, p.author_id, u.username AS author_username, \
             p.title, p.body, p.is_private, p.created_at, p.updated_at \
             FROM posts p \
             INNER JOIN users u ON u.id = p.author_id \
             WHERE p.category_id = ",
        );
        qb.push_bind(category_id);
        Self::apply_visibility(&mut qb, visibility);
        qb.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        qb.push_bind(i64::from(limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }
}

#[async_trait]
impl ReactionsRepo for PostgresRepositories {
    async fn favorite_post_ids(
        &self,
        user_id: UserId,
        post_ids: &[PostId],
    ) -> Result<Vec<PostId>, RepoError> {
        self.reaction_ids("post_favorites", user_id, post_ids).await
    }

    async fn liked_post_ids(
        &self,
        user_id: UserId,
        post_ids: &[PostId],
    ) -> Result<Vec<PostId>, RepoError> {
        self.reaction_ids("post_likes", user_id, post_ids).await
    }
}
