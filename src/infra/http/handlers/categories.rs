use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::categories::{CreateCategoryCommand, UpdateCategoryCommand};
use crate::application::viewer::Viewer;
use crate::domain::entities::CategoryId;

use super::super::error::ApiError;
use super::super::models::{
    CategoryCreateRequest, CategoryCreatedResponse, CategoryPatchRequest, CategoryReplaceRequest,
    ChildCategoryCreateRequest,
};
use super::super::state::ApiState;

const CREATED_MESSAGE: &str = "New category successfully created";

pub async fn list_categories(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let forest = state.categories.list_tree().await?;
    Ok(Json(forest))
}

pub async fn get_category(
    State(state): State<ApiState>,
    path: Result<Path<CategoryId>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = path?;
    let tree = state.categories.get_tree(id).await?;
    Ok(Json(tree))
}

pub async fn create_category(
    State(state): State<ApiState>,
    Extension(viewer): Extension<Viewer>,
    payload: Result<Json<CategoryCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // Anonymous callers get 401 even when the body is malformed.
    if viewer.user_id().is_none() {
        return Err(ApiError::unauthorized());
    }
    let Json(payload) = payload?;

    create(
        &state,
        viewer,
        CreateCategoryCommand {
            title: payload.title,
            parent_id: payload.parent,
        },
    )
    .await
}

pub async fn create_child_category(
    State(state): State<ApiState>,
    Extension(viewer): Extension<Viewer>,
    path: Result<Path<CategoryId>, PathRejection>,
    payload: Result<Json<ChildCategoryCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    if viewer.user_id().is_none() {
        return Err(ApiError::unauthorized());
    }
    let Path(parent_id) = path?;
    let Json(payload) = payload?;

    create(
        &state,
        viewer,
        CreateCategoryCommand {
            title: payload.title,
            parent_id: Some(parent_id),
        },
    )
    .await
}

async fn create(
    state: &ApiState,
    viewer: Viewer,
    command: CreateCategoryCommand,
) -> Result<(StatusCode, Json<CategoryCreatedResponse>), ApiError> {
    let category = state.categories.create(viewer, command).await?;
    Ok((
        StatusCode::CREATED,
        Json(CategoryCreatedResponse {
            message: CREATED_MESSAGE.to_string(),
            id: category.id,
        }),
    ))
}

pub async fn replace_category(
    State(state): State<ApiState>,
    Extension(viewer): Extension<Viewer>,
    path: Result<Path<CategoryId>, PathRejection>,
    payload: Result<Json<CategoryReplaceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    if viewer.user_id().is_none() {
        return Err(ApiError::unauthorized());
    }
    let Path(id) = path?;
    let Json(payload) = payload?;

    let command = UpdateCategoryCommand {
        title: Some(payload.title),
        parent_id: payload.parent,
    };
    let category = state.categories.update(viewer, id, command).await?;
    Ok(Json(category))
}

pub async fn patch_category(
    State(state): State<ApiState>,
    Extension(viewer): Extension<Viewer>,
    path: Result<Path<CategoryId>, PathRejection>,
    payload: Result<Json<CategoryPatchRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    if viewer.user_id().is_none() {
        return Err(ApiError::unauthorized());
    }
    let Path(id) = path?;
    let Json(payload) = payload?;

    let command = UpdateCategoryCommand {
        title: payload.title,
        parent_id: payload.parent,
    };
    let category = state.categories.update(viewer, id, command).await?;
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<ApiState>,
    Extension(viewer): Extension<Viewer>,
    path: Result<Path<CategoryId>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    if viewer.user_id().is_none() {
        return Err(ApiError::unauthorized());
    }
    let Path(id) = path?;
    state.categories.delete(viewer, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
