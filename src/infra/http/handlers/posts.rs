use axum::Json;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, State};
use axum::response::IntoResponse;

use crate::application::category_posts::CategoryPostsQuery;
use crate::application::viewer::Viewer;
use crate::domain::entities::CategoryId;

use super::super::error::ApiError;
use super::super::models::CategoryPostsParams;
use super::super::state::ApiState;

pub async fn list_category_posts(
    State(state): State<ApiState>,
    Extension(viewer): Extension<Viewer>,
    path: Result<Path<CategoryId>, PathRejection>,
    params: Result<Query<CategoryPostsParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = path?;
    let Query(params) = params?;
    let query = CategoryPostsQuery {
        page: params.page,
        page_size: params.page_size,
        cursor: params.cursor,
    };
    let page = state.category_posts.page(viewer, id, &query).await?;
    Ok(Json(page))
}
