//! Standings HTTP endpoint.
//!
//! GET /api/v1/standings?season_id=..&category_id=..

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::errors::{AppError, ErrorResponse};
use crate::routes::AppState;
use crate::services::standings::StandingRow;

#[derive(Debug, Deserialize, IntoParams)]
pub struct StandingsQuery {
    /// Upstream season id
    pub season_id: Option<String>,
    /// Upstream category id
    pub category_id: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("Missing query parameter '{}'", name)))
}

/// Get the cached standings of one season and category.
///
/// Rows are returned in championship order. A season/category without
/// cached data yields an empty list.
#[utoipa::path(
    get,
    path = "/api/v1/standings",
    tag = "Standings",
    params(StandingsQuery),
    responses(
        (status = 200, description = "Standings rows", body = Vec<StandingRow>),
        (status = 400, description = "Missing season_id or category_id", body = ErrorResponse),
        (status = 503, description = "Cache not warmed yet", body = ErrorResponse),
    )
)]
pub async fn get_standings(
    State(state): State<AppState>,
    Query(params): Query<StandingsQuery>,
) -> Result<Json<Vec<StandingRow>>, AppError> {
    let season_id = required(params.season_id, "season_id")?;
    let category_id = required(params.category_id, "category_id")?;

    let rows = state.cache.lookup(&season_id, &category_id).await?;
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::CacheManager;
    use crate::services::motogp::MotoGpClient;
    use crate::services::standings::PointsCell;
    use crate::services::store::SnapshotDocument;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::sync::Arc;

    async fn warm_state() -> AppState {
        let cache = CacheManager::new(MotoGpClient::new("http://127.0.0.1:9").unwrap(), Vec::new());
        let mut doc = SnapshotDocument::new();
        doc.insert(
            "s1__c1".into(),
            vec![StandingRow {
                position: Some(1),
                rider: "Francesco Bagnaia".into(),
                number: "1".into(),
                points: 467,
                gap: String::new(),
                race_points: PointsCell::Scored(318),
                sprint_points: PointsCell::Scored(149),
                country_flag: "https://flagicons.lipis.dev/flags/4x3/it.svg".into(),
                team: "Ducati Lenovo Team".into(),
                bike: "Ducati".into(),
                team_color: "#cc0000".into(),
            }],
        );
        cache.install(doc, "test").await;
        AppState {
            cache: Arc::new(cache),
        }
    }

    fn query(season: Option<&str>, category: Option<&str>) -> Query<StandingsQuery> {
        Query(StandingsQuery {
            season_id: season.map(str::to_string),
            category_id: category.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_known_key_returns_rows() {
        let Json(rows) = get_standings(State(warm_state().await), query(Some("s1"), Some("c1")))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].points, 467);
    }

    #[tokio::test]
    async fn test_unknown_key_returns_empty() {
        let Json(rows) = get_standings(State(warm_state().await), query(Some("s1"), Some("zz")))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_missing_or_blank_parameter_is_bad_request() {
        for q in [query(None, Some("c1")), query(Some("s1"), None), query(Some("  "), Some("c1"))] {
            let err = get_standings(State(warm_state().await), q).await.unwrap_err();
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }
}
