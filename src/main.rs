use std::{net::SocketAddr, process, sync::Arc};

use folio::{
    application::{
        categories::CategoryService,
        category_posts::CategoryPostsService,
        error::AppError,
        pagination::PaginationLimits,
        visitors::{VisitorSummaryService, VisitorTracker},
    },
    cache::{CacheInvalidator, CacheKeys, CacheStore, CachedListings, MemoryCacheStore},
    config,
    infra::{
        cache::RedisCacheStore,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState, TokenVerifier},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let jwt_secret = settings
        .auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| InfraError::configuration("auth.jwt_secret is not configured"))?;

    let repositories = init_repositories(&settings).await?;
    let store = init_cache_store(&settings.cache).await?;

    let keys = CacheKeys::new(settings.cache.key_prefix.clone());
    let listings = CachedListings::new(store.clone(), keys.clone(), settings.cache.default_ttl);
    let invalidator = CacheInvalidator::new(store, keys);

    let limits = PaginationLimits {
        default_page_size: settings.pagination.category_posts_page_size.get(),
        max_page_size: settings.pagination.category_posts_max_page_size.get(),
    };

    let state = ApiState {
        categories: Arc::new(CategoryService::new(
            repositories.clone(),
            repositories.clone(),
            listings.clone(),
            invalidator,
        )),
        category_posts: Arc::new(CategoryPostsService::new(
            repositories.clone(),
            repositories.clone(),
            repositories.clone(),
            limits,
        )),
        visitors: Arc::new(
            VisitorTracker::new(repositories.clone(), settings.visitors.bypass_ip)
                .with_enabled(settings.visitors.enabled),
        ),
        visitor_summary: Arc::new(VisitorSummaryService::new(repositories.clone(), listings)),
        tokens: Arc::new(TokenVerifier::new(jwt_secret)),
        health: repositories,
    };

    serve_http(&settings, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings).await?;
    info!("database migrations applied");
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn init_cache_store(
    settings: &config::CacheSettings,
) -> Result<Arc<dyn CacheStore>, AppError> {
    match settings.redis_url.as_deref() {
        Some(url) => {
            let store = RedisCacheStore::connect(url).await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("cache.redis_url is not configured; listings are cached in process");
            Ok(Arc::new(MemoryCacheStore::new()))
        }
    }
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
