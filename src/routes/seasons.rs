//! Season and category HTTP endpoints.
//!
//! - GET /api/v1/seasons
//! - GET /api/v1/seasons/:season_id/categories

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::{AppError, ErrorResponse};
use crate::routes::AppState;

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct SeasonResponse {
    /// Opaque upstream season id
    pub id: String,
    /// Competition year, absent when the upstream lookup failed
    pub year: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct CategoryResponse {
    /// Opaque upstream category id
    pub id: String,
    /// Class name, e.g. "MotoGP", "Moto2", "500cc"
    pub name: String,
}

/// List seasons with cached standings, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/seasons",
    tag = "Seasons",
    responses(
        (status = 200, description = "Seasons present in the cache", body = Vec<SeasonResponse>),
        (status = 503, description = "Cache not warmed yet", body = ErrorResponse),
    )
)]
pub async fn list_seasons(
    State(state): State<AppState>,
) -> Result<Json<Vec<SeasonResponse>>, AppError> {
    let ids = state.cache.season_ids().await?;

    let years: HashMap<String, i32> = match state.cache.client().list_seasons().await {
        Ok(seasons) => seasons.into_iter().map(|s| (s.id, s.year)).collect(),
        Err(e) => {
            tracing::warn!("Season year lookup failed, returning ids only: {}", e);
            HashMap::new()
        }
    };

    let mut seasons: Vec<SeasonResponse> = ids
        .into_iter()
        .map(|id| SeasonResponse {
            year: years.get(&id).copied(),
            id,
        })
        .collect();
    seasons.sort_by(|a, b| b.year.cmp(&a.year));

    Ok(Json(seasons))
}

/// List the categories of a season, straight from upstream.
#[utoipa::path(
    get,
    path = "/api/v1/seasons/{season_id}/categories",
    tag = "Seasons",
    params(
        ("season_id" = String, Path, description = "Upstream season id"),
    ),
    responses(
        (status = 200, description = "Categories of the season", body = Vec<CategoryResponse>),
        (status = 502, description = "Upstream failure", body = ErrorResponse),
    )
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Path(season_id): Path<String>,
) -> Result<Json<Vec<CategoryResponse>>, AppError> {
    let categories = state.cache.client().list_categories(&season_id).await?;
    Ok(Json(
        categories
            .into_iter()
            .map(|c| CategoryResponse {
                id: c.id,
                name: c.name,
            })
            .collect(),
    ))
}
