//! HTTP surface: JSON API routes and the middleware stack around them.

pub mod auth;
pub mod error;
mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use auth::TokenVerifier;
pub use error::ApiError;
pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use self::middleware::{authenticate, log_responses, set_request_context, track_visitors};

pub fn build_router(state: ApiState) -> Router {
    let auth_state = state.clone();
    let visitor_state = state.clone();

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/categories/",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/categories/{id}/",
            get(handlers::get_category)
                .put(handlers::replace_category)
                .patch(handlers::patch_category)
                .delete(handlers::delete_category),
        )
        .route(
            "/categories/{id}/create/",
            post(handlers::create_child_category),
        )
        .route(
            "/categories/{id}/posts/",
            get(handlers::list_category_posts),
        )
        .route("/visitors/summary/", get(handlers::visitor_summary))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            authenticate,
        ))
        .layer(axum_middleware::from_fn_with_state(
            visitor_state,
            track_visitors,
        ))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
