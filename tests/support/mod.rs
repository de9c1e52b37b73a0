#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::Response;
use http_body_util::BodyExt;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use time::macros::datetime;
use time::{Date, OffsetDateTime};

use folio::application::categories::CategoryService;
use folio::application::category_posts::CategoryPostsService;
use folio::application::pagination::PaginationLimits;
use folio::application::repos::{
    CategoriesRepo, CategoriesWriteRepo, CreateCategoryParams, HealthRepo, PostVisibility,
    PostsRepo, ReactionsRepo, RepoError, UpdateCategoryParams, VisitTotals, VisitorsRepo,
};
use folio::application::visitors::{VisitorSummaryService, VisitorTracker};
use folio::cache::{CacheInvalidator, CacheKeys, CachedListings, MemoryCacheStore};
use folio::domain::categories::{child_path, is_within};
use folio::domain::entities::{
    CategoryId, CategoryRecord, PostAuthor, PostId, PostRecord, UserId, VisitRecord,
};
use folio::infra::http::auth::AccessClaims;
use folio::infra::http::{ApiState, TokenVerifier, build_router};

pub const TEST_SECRET: &str = "folio-test-secret";
pub const CACHE_PREFIX: &str = "folio-test";

const EPOCH: OffsetDateTime = datetime!(2024-01-01 0:00 UTC);

#[derive(Default)]
struct Store {
    next_category_id: CategoryId,
    next_post_id: PostId,
    categories: BTreeMap<CategoryId, CategoryRecord>,
    posts: BTreeMap<PostId, PostRecord>,
    favorites: HashSet<(UserId, PostId)>,
    likes: HashSet<(UserId, PostId)>,
    visits: HashMap<String, VisitRecord>,
    reaction_lookups: Vec<Vec<PostId>>,
    fail_visits: bool,
}

/// In-memory stand-in for every repository the services depend on.
#[derive(Default)]
pub struct MemoryRepos {
    store: Mutex<Store>,
}

impl MemoryRepos {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().expect("store lock")
    }

    pub fn seed_category(
        &self,
        title: &str,
        parent_id: Option<CategoryId>,
        author_id: UserId,
    ) -> CategoryRecord {
        let mut store = self.store();
        store.next_category_id += 1;
        let id = store.next_category_id;
        let parent_path = parent_id.map(|parent| {
            store
                .categories
                .get(&parent)
                .expect("seeded parent exists")
                .path
                .clone()
        });
        let record = CategoryRecord {
            id,
            title: title.to_string(),
            parent_id,
            path: child_path(parent_path.as_deref(), id),
            author_id,
            created_at: EPOCH,
            updated_at: EPOCH,
        };
        store.categories.insert(id, record.clone());
        record
    }

    /// Later posts are newer.
    pub fn seed_post(&self, category_id: CategoryId, author_id: UserId, is_private: bool) -> PostId {
        let mut store = self.store();
        store.next_post_id += 1;
        let id = store.next_post_id;
        let created_at = EPOCH + time::Duration::minutes(id);
        store.posts.insert(
            id,
            PostRecord {
                id,
                category_id,
                author: PostAuthor {
                    id: author_id,
                    username: format!("user{author_id}"),
                },
                title: format!("Post {id}"),
                body: String::new(),
                is_private,
                created_at,
                updated_at: created_at,
            },
        );
        id
    }

    pub fn favorite(&self, user_id: UserId, post_id: PostId) {
        self.store().favorites.insert((user_id, post_id));
    }

    pub fn like(&self, user_id: UserId, post_id: PostId) {
        self.store().likes.insert((user_id, post_id));
    }

    pub fn reaction_lookups(&self) -> Vec<Vec<PostId>> {
        self.store().reaction_lookups.clone()
    }

    pub fn category(&self, id: CategoryId) -> Option<CategoryRecord> {
        self.store().categories.get(&id).cloned()
    }

    pub fn category_count(&self) -> usize {
        self.store().categories.len()
    }

    pub fn post_ids(&self) -> Vec<PostId> {
        self.store().posts.keys().copied().collect()
    }

    pub fn visit(&self, ip: &str) -> Option<VisitRecord> {
        self.store().visits.get(ip).cloned()
    }

    pub fn visit_count(&self) -> usize {
        self.store().visits.len()
    }

    pub fn fail_visits(&self) {
        self.store().fail_visits = true;
    }
}

fn visible(post: &PostRecord, category_id: CategoryId, visibility: PostVisibility) -> bool {
    post.category_id == category_id
        && match visibility {
            PostVisibility::Public => !post.is_private,
            PostVisibility::PublicOrAuthoredBy(user_id) => {
                !post.is_private || post.author.id == user_id
            }
        }
}

#[async_trait]
impl VisitorsRepo for MemoryRepos {
    async fn record_visit(&self, ip: IpAddr, today: Date) -> Result<VisitRecord, RepoError> {
        let mut store = self.store();
        if store.fail_visits {
            return Err(RepoError::Persistence("visit storage offline".into()));
        }
        let key = ip.to_string();
        let record = store
            .visits
            .entry(key.clone())
            .and_modify(|record| record.visit_count += 1)
            .or_insert_with(|| VisitRecord {
                ip_address: key,
                visit_count: 1,
                first_seen_date: today,
            });
        Ok(record.clone())
    }

    async fn find_visit(&self, ip: IpAddr) -> Result<Option<VisitRecord>, RepoError> {
        Ok(self.store().visits.get(&ip.to_string()).cloned())
    }

    async fn visit_totals(&self) -> Result<VisitTotals, RepoError> {
        let store = self.store();
        Ok(VisitTotals {
            unique_visitors: store.visits.len() as i64,
            total_visits: store.visits.values().map(|visit| visit.visit_count).sum(),
        })
    }
}

#[async_trait]
impl CategoriesRepo for MemoryRepos {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let mut records: Vec<_> = self.store().categories.values().cloned().collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }

    async fn find_category(&self, id: CategoryId) -> Result<Option<CategoryRecord>, RepoError> {
        Ok(self.category(id))
    }

    async fn list_subtree(&self, root: &CategoryRecord) -> Result<Vec<CategoryRecord>, RepoError> {
        let mut records: Vec<_> = self
            .store()
            .categories
            .values()
            .filter(|record| is_within(&record.path, &root.path))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }
}

#[async_trait]
impl CategoriesWriteRepo for MemoryRepos {
    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        if params
            .parent_id
            .is_some_and(|parent_id| self.category(parent_id).is_none())
        {
            return Err(RepoError::NotFound);
        }
        Ok(self.seed_category(&params.title, params.parent_id, params.author_id))
    }

    async fn update_category(
        &self,
        params: UpdateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let mut store = self.store();
        let current = store
            .categories
            .get(&params.id)
            .cloned()
            .ok_or(RepoError::NotFound)?;

        if current.parent_id != params.parent_id {
            let parent_path = match params.parent_id {
                Some(parent_id) => Some(
                    store
                        .categories
                        .get(&parent_id)
                        .ok_or(RepoError::NotFound)?
                        .path
                        .clone(),
                ),
                None => None,
            };
            if parent_path
                .as_deref()
                .is_some_and(|path| is_within(path, &current.path))
            {
                return Err(RepoError::InvalidInput {
                    message: "cannot move below own subtree".into(),
                });
            }
            let new_path = child_path(parent_path.as_deref(), params.id);
            for record in store.categories.values_mut() {
                if is_within(&record.path, &current.path) {
                    record.path = format!("{new_path}{}", &record.path[current.path.len()..]);
                }
            }
        }

        let record = store
            .categories
            .get_mut(&params.id)
            .ok_or(RepoError::NotFound)?;
        record.title = params.title;
        record.parent_id = params.parent_id;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), RepoError> {
        let mut store = self.store();
        let root_path = store
            .categories
            .get(&id)
            .map(|record| record.path.clone())
            .ok_or(RepoError::NotFound)?;

        let removed: HashSet<CategoryId> = store
            .categories
            .values()
            .filter(|record| is_within(&record.path, &root_path))
            .map(|record| record.id)
            .collect();
        store.categories.retain(|id, _| !removed.contains(id));
        store
            .posts
            .retain(|_, post| !removed.contains(&post.category_id));
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for MemoryRepos {
    async fn count_in_category(
        &self,
        category_id: CategoryId,
        visibility: PostVisibility,
    ) -> Result<u64, RepoError> {
        Ok(self
            .store()
            .posts
            .values()
            .filter(|post| visible(post, category_id, visibility))
            .count() as u64)
    }

    async fn list_in_category(
        &self,
        category_id: CategoryId,
        visibility: PostVisibility,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mut posts: Vec<_> = self
            .store()
            .posts
            .values()
            .filter(|post| visible(post, category_id, visibility))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl ReactionsRepo for MemoryRepos {
    async fn favorite_post_ids(
        &self,
        user_id: UserId,
        post_ids: &[PostId],
    ) -> Result<Vec<PostId>, RepoError> {
        let mut store = self.store();
        store.reaction_lookups.push(post_ids.to_vec());
        Ok(post_ids
            .iter()
            .copied()
            .filter(|id| store.favorites.contains(&(user_id, *id)))
            .collect())
    }

    async fn liked_post_ids(
        &self,
        user_id: UserId,
        post_ids: &[PostId],
    ) -> Result<Vec<PostId>, RepoError> {
        let mut store = self.store();
        store.reaction_lookups.push(post_ids.to_vec());
        Ok(post_ids
            .iter()
            .copied()
            .filter(|id| store.likes.contains(&(user_id, *id)))
            .collect())
    }
}

#[async_trait]
impl HealthRepo for MemoryRepos {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

pub fn limits() -> PaginationLimits {
    PaginationLimits {
        default_page_size: 1,
        max_page_size: 8,
    }
}

pub struct TestApp {
    pub router: Router,
    pub repos: Arc<MemoryRepos>,
    pub cache: Arc<MemoryCacheStore>,
}

impl TestApp {
    pub fn new(repos: Arc<MemoryRepos>, bypass: Option<IpAddr>) -> Self {
        let cache = Arc::new(MemoryCacheStore::new());
        let keys = CacheKeys::new(CACHE_PREFIX);
        let listings = CachedListings::new(cache.clone(), keys.clone(), Duration::from_secs(60));
        let invalidator = CacheInvalidator::new(cache.clone(), keys);

        let state = ApiState {
            categories: Arc::new(CategoryService::new(
                repos.clone(),
                repos.clone(),
                listings.clone(),
                invalidator,
            )),
            category_posts: Arc::new(CategoryPostsService::new(
                repos.clone(),
                repos.clone(),
                repos.clone(),
                limits(),
            )),
            visitors: Arc::new(VisitorTracker::new(repos.clone(), bypass)),
            visitor_summary: Arc::new(VisitorSummaryService::new(repos.clone(), listings)),
            tokens: Arc::new(TokenVerifier::new(TEST_SECRET)),
            health: repos.clone(),
        };

        Self {
            router: build_router(state),
            repos,
            cache,
        }
    }
}

pub fn bearer(user_id: UserId) -> String {
    let claims = AccessClaims {
        user_id,
        exp: (OffsetDateTime::now_utc().unix_timestamp() + 3600) as u64,
        token_type: Some("access".to_string()),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("encode token");
    format!("Bearer {token}")
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}
