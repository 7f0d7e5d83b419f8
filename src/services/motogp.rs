//! MotoGP results API client.
//!
//! Thin typed wrappers over the pulselive results endpoints. Upstream JSON is
//! loosely shaped (ids are sometimes numbers, colours live in several places),
//! so every response is normalised into the record types below before it
//! leaves this module.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::AppError;

/// Fixed timeout applied to every upstream request.
const UPSTREAM_TIMEOUT_SECS: u64 = 15;

/// A competition year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Season {
    pub id: String,
    pub year: i32,
}

/// A race class within a season (e.g. "MotoGP", "Moto2", "500cc").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// A finished race weekend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionType {
    Sprint,
    Race,
    Other(String),
}

impl SessionType {
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_uppercase().as_str() {
            "SPR" => SessionType::Sprint,
            "RAC" => SessionType::Race,
            other => SessionType::Other(other.to_string()),
        }
    }

    /// Only sprint and race sessions award championship points we track.
    pub fn is_scoring(&self) -> bool {
        matches!(self, SessionType::Sprint | SessionType::Race)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub session_type: SessionType,
}

/// Every place a classification entry may carry colour information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorHint {
    pub team_color: Option<String>,
    pub rider_color: Option<String>,
    /// `team.color` on the nested team object.
    pub nested_team_color: Option<String>,
    /// Free-text inline style markup.
    pub style: Option<String>,
    /// The whole entry as JSON text, for the last-resort hex scan.
    pub raw_text: String,
}

/// One rider's line in a single session classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationEntry {
    pub rider_id: String,
    pub points: u32,
    pub color: ColorHint,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiderInfo {
    pub id: String,
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub number: Option<String>,
    pub country_iso: Option<String>,
    pub country_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamInfo {
    pub name: Option<String>,
    pub color: Option<String>,
}

/// One rider's line in the season standings, in upstream rank order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandingEntry {
    pub position: Option<u32>,
    /// `None` when upstream omits the field or sends null.
    pub points: Option<u32>,
    pub rider: RiderInfo,
    pub team: Option<TeamInfo>,
    pub constructor_name: Option<String>,
}

// --- MotoGP JSON response types ---

#[derive(Debug, Deserialize)]
struct WireSeason {
    id: Option<Value>,
    year: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireCategory {
    id: Option<Value>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireSession {
    id: Option<Value>,
    #[serde(rename = "type")]
    session_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireStanding {
    position: Option<Value>,
    points: Option<Value>,
    rider: Option<WireRider>,
    team: Option<WireTeam>,
    constructor: Option<WireNamed>,
}

#[derive(Debug, Deserialize)]
struct WireRider {
    id: Option<Value>,
    full_name: Option<String>,
    name: Option<String>,
    surname: Option<String>,
    number: Option<Value>,
    country: Option<WireCountry>,
}

#[derive(Debug, Deserialize)]
struct WireCountry {
    iso: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTeam {
    name: Option<String>,
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireNamed {
    name: Option<String>,
}

/// Render a JSON id (string or number) as an opaque string.
fn opaque_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Points are non-negative; fractional (half-points) values are floored.
fn points_value(v: &Value) -> Option<u32> {
    if let Some(n) = v.as_u64() {
        return Some(n.min(u32::MAX as u64) as u32);
    }
    v.as_f64()
        .filter(|f| f.is_finite())
        .map(|f| f.max(0.0).floor() as u32)
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Deserialize each element of a JSON array, skipping elements of the wrong
/// shape. A non-array value yields an empty list.
fn parse_list<W: DeserializeOwned, T>(value: Value, convert: impl Fn(W) -> Option<T>) -> Vec<T> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<W>(item) {
            Ok(wire) => convert(wire),
            Err(e) => {
                tracing::debug!("Skipping malformed upstream list element: {}", e);
                None
            }
        })
        .collect()
}

fn season_from_wire(w: WireSeason) -> Option<Season> {
    let id = w.id.as_ref().and_then(opaque_id)?;
    let year = w.year.as_ref().and_then(Value::as_i64)?;
    Some(Season {
        id,
        year: i32::try_from(year).ok()?,
    })
}

fn category_from_wire(w: WireCategory) -> Option<Category> {
    Some(Category {
        id: w.id.as_ref().and_then(opaque_id)?,
        name: w.name.unwrap_or_default(),
    })
}

fn event_from_wire(w: WireEvent) -> Option<Event> {
    Some(Event {
        id: w.id.as_ref().and_then(opaque_id)?,
    })
}

fn session_from_wire(w: WireSession) -> Option<Session> {
    Some(Session {
        id: w.id.as_ref().and_then(opaque_id)?,
        session_type: SessionType::from_code(w.session_type.as_deref().unwrap_or_default()),
    })
}

fn standing_from_wire(w: WireStanding) -> Option<StandingEntry> {
    let rider = w
        .rider
        .map(|r| {
            let (country_iso, country_name) = match r.country {
                Some(c) => (non_empty(c.iso.as_deref()), non_empty(c.name.as_deref())),
                None => (None, None),
            };
            RiderInfo {
                id: r.id.as_ref().and_then(opaque_id).unwrap_or_default(),
                full_name: r.full_name,
                name: r.name,
                surname: r.surname,
                number: r.number.as_ref().and_then(opaque_id),
                country_iso,
                country_name,
            }
        })
        .unwrap_or_default();

    Some(StandingEntry {
        position: w
            .position
            .as_ref()
            .and_then(Value::as_u64)
            .and_then(|p| u32::try_from(p).ok()),
        points: w.points.as_ref().and_then(points_value),
        rider,
        team: w.team.map(|t| TeamInfo {
            name: t.name,
            color: non_empty(t.color.as_deref()),
        }),
        constructor_name: w.constructor.and_then(|c| c.name),
    })
}

/// Build a classification entry from one raw element. Entries without a
/// rider id cannot be attributed and are dropped.
fn classification_entry_from_value(entry: &Value) -> Option<ClassificationEntry> {
    let rider_id = entry.get("rider")?.get("id").and_then(opaque_id)?;
    let points = entry.get("points").and_then(points_value).unwrap_or(0);
    let str_field = |v: Option<&Value>| non_empty(v.and_then(Value::as_str));

    Some(ClassificationEntry {
        rider_id,
        points,
        color: ColorHint {
            team_color: str_field(entry.get("team_color")),
            rider_color: str_field(entry.get("rider_color")),
            nested_team_color: str_field(entry.get("team").and_then(|t| t.get("color"))),
            style: str_field(entry.get("style")),
            raw_text: entry.to_string(),
        },
    })
}

/// Extract the `classification` array of an object response, or nothing.
fn classification_array(value: Value) -> Vec<Value> {
    match value {
        Value::Object(mut map) => match map.remove("classification") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Client for the MotoGP results API.
#[derive(Debug, Clone)]
pub struct MotoGpClient {
    client: reqwest::Client,
    base_url: String,
}

impl MotoGpClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET a URL and parse the body as JSON. 404 is reported separately so
    /// callers can treat it as absence of data.
    async fn get_json(&self, url: &str) -> Result<Value, AppError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::ExternalServiceError(format!("MotoGP request to {} failed: {}", url, e))
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::UpstreamNotFound(url.to_string()));
        }

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "MotoGP API returned HTTP {} for {}",
                response.status(),
                url
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            AppError::ExternalServiceError(format!("MotoGP JSON parse error for {}: {}", url, e))
        })
    }

    /// All seasons that carry an integer year.
    pub async fn list_seasons(&self) -> Result<Vec<Season>, AppError> {
        let url = format!("{}/seasons", self.base_url);
        let value = self.get_json(&url).await?;
        Ok(parse_list(value, season_from_wire))
    }

    pub async fn list_categories(&self, season_id: &str) -> Result<Vec<Category>, AppError> {
        let url = format!("{}/categories?seasonUuid={}", self.base_url, season_id);
        let value = self.get_json(&url).await?;
        Ok(parse_list(value, category_from_wire))
    }

    /// Finished events of a season. Upstream answers 404 for some historical
    /// seasons without recorded events; that is reported as no events.
    pub async fn list_events(&self, season_id: &str) -> Result<Vec<Event>, AppError> {
        let url = format!(
            "{}/events?seasonUuid={}&isFinished=true",
            self.base_url, season_id
        );
        match self.get_json(&url).await {
            Ok(value) => Ok(parse_list(value, event_from_wire)),
            Err(AppError::UpstreamNotFound(_)) => {
                tracing::info!(
                    "Events endpoint returned 404 for season {}, treating as no events",
                    season_id
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Sprint and race sessions of one event/category. Other session types
    /// are filtered out here.
    pub async fn list_sessions(
        &self,
        event_id: &str,
        category_id: &str,
    ) -> Result<Vec<Session>, AppError> {
        let url = format!(
            "{}/sessions?eventUuid={}&categoryUuid={}",
            self.base_url, event_id, category_id
        );
        let value = self.get_json(&url).await?;
        Ok(parse_list(value, session_from_wire)
            .into_iter()
            .filter(|s| s.session_type.is_scoring())
            .collect())
    }

    pub async fn get_session_classification(
        &self,
        session_id: &str,
    ) -> Result<Vec<ClassificationEntry>, AppError> {
        let url = format!(
            "{}/session/{}/classification?test=false",
            self.base_url, session_id
        );
        let value = self.get_json(&url).await?;
        Ok(classification_array(value)
            .iter()
            .filter_map(classification_entry_from_value)
            .collect())
    }

    /// Base championship standings, in upstream rank order.
    pub async fn get_standings(
        &self,
        season_id: &str,
        category_id: &str,
    ) -> Result<Vec<StandingEntry>, AppError> {
        let url = format!(
            "{}/standings?seasonUuid={}&categoryUuid={}",
            self.base_url, season_id, category_id
        );
        let value = self.get_json(&url).await?;
        Ok(parse_list(Value::Array(classification_array(value)), standing_from_wire))
    }
}
