use rating_portal::{
    AppState,
    cache::{CacheState, SnapshotRatingCache},
    config::{AppConfig, Env},
    create_router,
    repository::{DeadlineRepository, PostgresRepository, RepositoryState},
    voting::VotingEngine,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point, responsible for initializing configuration,
/// logging, the Postgres pool, the Redis-backed rating cache, the voting
/// engine and the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration loading (fail-fast on missing production secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging filter: RUST_LOG wins, otherwise sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rating_portal=debug,tower_http=info,axum=trace".into());

    // 3. Log format per environment: pretty locally, JSON for aggregators in
    // production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database initialization.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    // Every store call is bounded by the per-operation deadline.
    let postgres = Arc::new(PostgresRepository::new(pool)) as RepositoryState;
    let repo = Arc::new(DeadlineRepository::new(postgres)) as RepositoryState;

    // The role set is fixed and seeded idempotently on every boot. A failure
    // here is logged but does not abort startup; the guard will simply reject
    // callers until roles exist.
    if let Err(e) = repo.ensure_seed_roles().await {
        tracing::error!("failed to seed roles: {e}");
    }

    // 5. Rating cache (Redis pool) in front of the aggregate query.
    let cache = Arc::new(
        SnapshotRatingCache::redis_from_url(&config.redis_url, repo.clone())
            .expect("FATAL: Failed to configure Redis. Check REDIS_URL."),
    ) as CacheState;

    // 6. Voting engine over the shared repository.
    let engine = Arc::new(VotingEngine::new(repo.clone()));

    // 7. Unified state assembly.
    let app_state = AppState {
        repo,
        cache,
        engine,
        config: config.clone(),
    };

    // 8. Router and server startup.
    let app = create_router(app_state);

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .expect("FATAL: Failed to bind listen address.");

    tracing::info!("Listening on {}", config.listen_addr);
    tracing::info!("API documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app).await.unwrap();
}
