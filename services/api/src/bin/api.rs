//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, FixtureSnapshotSource, InMemoryCacheStore},
    config::{CacheStoreKind, Config},
    error::ApiError,
    web::{api_router, rest::ApiDoc, state::AppState},
};
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    Router,
};
use classroom_cache_core::{CacheManager, CacheStore, SnapshotSink, SnapshotSource};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Choose the Snapshot and Cache Adapters ---
    let (source, sink): (Arc<dyn SnapshotSource>, Arc<dyn SnapshotSink>) =
        match &config.snapshot_fixtures_path {
            Some(dir) => {
                info!("Reading snapshots from fixtures in {}", dir.display());
                let fixtures = Arc::new(FixtureSnapshotSource::new(dir.clone()));
                (fixtures.clone() as Arc<dyn SnapshotSource>, fixtures as Arc<dyn SnapshotSink>)
            }
            None => (
                db_adapter.clone() as Arc<dyn SnapshotSource>,
                db_adapter.clone() as Arc<dyn SnapshotSink>,
            ),
        };

    let store: Arc<dyn CacheStore> = match config.cache_store {
        CacheStoreKind::Postgres => db_adapter.clone(),
        CacheStoreKind::Memory => {
            info!("Keeping the classroom cache in memory");
            Arc::new(InMemoryCacheStore::new())
        }
    };

    // --- 4. Build the Shared AppState ---
    let cache = CacheManager::with_version(source, store, config.cache_version.clone());
    info!("Classroom cache version {}", cache.current_version());
    let app_state = Arc::new(AppState {
        cache: Arc::new(cache),
        snapshots: sink,
    });

    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(api_lib::web::middleware::TEACHER_HEADER),
        ]);

    // --- 5. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
