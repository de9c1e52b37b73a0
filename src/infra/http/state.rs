use std::sync::Arc;

use crate::application::categories::CategoryService;
use crate::application::category_posts::CategoryPostsService;
use crate::application::repos::HealthRepo;
use crate::application::visitors::{VisitorSummaryService, VisitorTracker};

use super::auth::TokenVerifier;

#[derive(Clone)]
pub struct ApiState {
    pub categories: Arc<CategoryService>,
    pub category_posts: Arc<CategoryPostsService>,
    pub visitors: Arc<VisitorTracker>,
    pub visitor_summary: Arc<VisitorSummaryService>,
    pub tokens: Arc<TokenVerifier>,
    pub health: Arc<dyn HealthRepo>,
}
