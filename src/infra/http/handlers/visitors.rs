use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use super::super::error::ApiError;
use super::super::state::ApiState;

pub async fn visitor_summary(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let totals = state.visitor_summary.summary().await?;
    Ok(Json(totals))
}
