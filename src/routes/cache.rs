//! Cache maintenance HTTP endpoints.
//!
//! - POST /api/v1/cache/refresh
//! - GET  /api/v1/cache/status

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::routes::AppState;
use crate::services::cache::{CacheStatus, RefreshOutcome};

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    /// "started", or "already_running" when a rebuild was in flight
    pub status: RefreshOutcome,
}

/// Trigger a background rebuild of the standings cache.
///
/// Returns immediately. A rebuild already in flight is not restarted.
#[utoipa::path(
    post,
    path = "/api/v1/cache/refresh",
    tag = "Cache",
    responses(
        (status = 202, description = "Rebuild started or already running", body = RefreshResponse),
    )
)]
pub async fn refresh_cache(State(state): State<AppState>) -> (StatusCode, Json<RefreshResponse>) {
    let status = state.cache.refresh();
    tracing::info!("Cache refresh requested: {:?}", status);
    (StatusCode::ACCEPTED, Json(RefreshResponse { status }))
}

/// Get the current cache status.
#[utoipa::path(
    get,
    path = "/api/v1/cache/status",
    tag = "Cache",
    responses(
        (status = 200, description = "Current cache status", body = CacheStatus),
    )
)]
pub async fn get_cache_status(State(state): State<AppState>) -> Json<CacheStatus> {
    Json(state.cache.status().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::{CacheManager, CacheState};
    use crate::services::motogp::MotoGpClient;
    use crate::services::store::SnapshotDocument;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState {
            cache: Arc::new(CacheManager::new(
                MotoGpClient::new("http://127.0.0.1:9").unwrap(),
                Vec::new(),
            )),
        }
    }

    #[tokio::test]
    async fn test_status_of_warm_cache() {
        let state = state();
        let mut doc = SnapshotDocument::new();
        doc.insert("s__c".into(), Vec::new());
        state.cache.install(doc, "file").await;

        let Json(status) = get_cache_status(State(state)).await;
        assert_eq!(status.state, CacheState::Warm);
        assert_eq!(status.entries, 1);
        assert_eq!(status.source.as_deref(), Some("file"));
        assert_eq!(status.total_rebuilds, 0);
    }

    #[test]
    fn test_refresh_response_shape() {
        let body = serde_json::to_value(RefreshResponse {
            status: RefreshOutcome::AlreadyRunning,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"status": "already_running"}));
    }
}
