// MotoGP Standings API v0.1
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod errors;
mod routes;
mod services;

use config::AppConfig;
use routes::AppState;
use services::cache::CacheManager;
use services::motogp::MotoGpClient;
use services::store::{FileSnapshotStore, RedisSnapshotStore, SnapshotStore};

/// MotoGP Standings API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "MotoGP Standings API",
        version = "0.1.0",
        description = "Championship standings for every MotoGP season and class. \
            Standings are precomputed from the official results API, enriched with \
            sprint/race point breakdowns, gaps to the leader, flags and team colours, \
            and served from an in-memory snapshot persisted to redis and a local file.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Seasons", description = "Seasons and categories"),
        (name = "Standings", description = "Cached championship standings"),
        (name = "Cache", description = "Standings cache maintenance"),
    ),
    paths(
        routes::health::health_check,
        routes::seasons::list_seasons,
        routes::seasons::list_categories,
        routes::standings::get_standings,
        routes::cache::refresh_cache,
        routes::cache::get_cache_status,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::seasons::SeasonResponse,
            routes::seasons::CategoryResponse,
            routes::cache::RefreshResponse,
            services::standings::StandingRow,
            services::standings::PointsCell,
            services::cache::CacheStatus,
            services::cache::CacheState,
            services::cache::RefreshOutcome,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

/// Snapshot stores in load priority order: redis first, then the local file.
fn build_stores(config: &AppConfig) -> Vec<Arc<dyn SnapshotStore>> {
    let mut stores: Vec<Arc<dyn SnapshotStore>> = Vec::new();

    if let Some(redis) = &config.redis {
        match RedisSnapshotStore::new(&redis.url(), config.cache_ttl_secs) {
            Ok(store) => {
                tracing::info!("Redis snapshot store at {}:{}", redis.host, redis.port);
                stores.push(Arc::new(store));
            }
            Err(e) => {
                tracing::error!("Redis snapshot store disabled: {}", e);
            }
        }
    }

    if let Some(path) = &config.cache_file {
        tracing::info!("File snapshot store at {}", path);
        stores.push(Arc::new(FileSnapshotStore::new(path)));
    }

    if stores.is_empty() {
        tracing::warn!("No snapshot stores configured; every restart rebuilds from upstream");
    }
    stores
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "motogp_standings_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    let client =
        MotoGpClient::new(&config.motogp_api_url).expect("Failed to create MotoGP API client");

    let cache = Arc::new(CacheManager::new(client, build_stores(&config)));

    // Warm the cache from a stored snapshot, or rebuild it. A failed rebuild
    // still lets the server start; the cache stays empty until a refresh.
    cache.load_or_rebuild().await;

    if let Some(interval) = config.refresh_interval_secs {
        tokio::spawn(services::refresher::run_refresher(cache.clone(), interval));
    }

    let app_state = AppState { cache };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/seasons", get(routes::seasons::list_seasons))
        .route(
            "/api/v1/seasons/:season_id/categories",
            get(routes::seasons::list_categories),
        )
        .route("/api/v1/standings", get(routes::standings::get_standings))
        .route("/api/v1/cache/refresh", post(routes::cache::refresh_cache))
        .route("/api/v1/cache/status", get(routes::cache::get_cache_status))
        .with_state(app_state);

    let app = Router::new()
        .merge(api_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
