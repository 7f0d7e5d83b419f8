use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::routes::AppState;
use crate::services::cache::CacheState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok" when standings are served, "degraded" while the
    /// cache has never been warmed)
    pub status: String,
    /// API version
    pub version: String,
    /// Standings cache lifecycle state
    pub cache: CacheState,
}

/// Health check endpoint.
///
/// Always 200. Status is "degraded" until a snapshot has been loaded or
/// built, so load balancers can tell a cold instance from a broken one.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let warm = state.cache.current().await.is_some();

    Json(HealthResponse {
        status: if warm {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache: state.cache.state().await,
    })
}
