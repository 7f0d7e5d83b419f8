//! Standings assembly.
//!
//! Turns one season/category's base standings (already rank-ordered by
//! upstream) plus the per-rider session aggregates into display rows. Row
//! order and count always match the base standings.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::services::aggregator::{aggregate_sessions, collect_scoring_sessions, RiderAggregates};
use crate::services::color::DEFAULT_COLOR;
use crate::services::motogp::{Category, Event, MotoGpClient, Season, StandingEntry};

/// First season with sprint races.
const SPRINT_INTRODUCED_YEAR: i32 = 2023;

/// Sprint races exist only in the premier class.
const PREMIER_CLASS_NAME: &str = "MotoGP";

const FLAG_ICON_BASE_URL: &str = "https://flagicons.lipis.dev/flags/4x3";

/// Flag code of the generic "unknown country" icon.
const UNKNOWN_FLAG_CODE: &str = "xx";

/// Shown in the SPR/RAC columns when sprint scoring does not apply.
pub const NOT_APPLICABLE: &str = "-";

/// A sprint/race points column: a score, or a placeholder distinguishing
/// "not tracked" from "scored zero".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum PointsCell {
    Scored(u32),
    Placeholder(String),
}

impl PointsCell {
    pub fn not_applicable() -> Self {
        PointsCell::Placeholder(NOT_APPLICABLE.to_string())
    }
}

impl<'de> Deserialize<'de> for PointsCell {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Ok(PointsCell::Placeholder(s)),
            other => floored_points(&other)
                .map(PointsCell::Scored)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid points cell {}", other))),
        }
    }
}

/// One rider's assembled row for a season/category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StandingRow {
    /// Championship position
    #[serde(rename = "P", default, deserialize_with = "lenient_position")]
    pub position: Option<u32>,
    /// Rider full name
    #[serde(rename = "Rider")]
    pub rider: String,
    /// Race number, blank when unknown
    #[serde(rename = "#", deserialize_with = "lenient_number")]
    pub number: String,
    /// Total championship points
    #[serde(rename = "Points", deserialize_with = "lenient_points")]
    pub points: u32,
    /// Gap to the leader ("" for the leader, "0" for ties, else "-N")
    #[serde(rename = "Def.")]
    pub gap: String,
    /// Points scored in main races
    #[serde(rename = "RAC")]
    pub race_points: PointsCell,
    /// Points scored in sprint races
    #[serde(rename = "SPR")]
    pub sprint_points: PointsCell,
    /// Flag icon URL (snapshots written by older versions call this `Flag`)
    #[serde(rename = "Country", alias = "Flag")]
    pub country_flag: String,
    /// Team name
    #[serde(rename = "Team")]
    pub team: String,
    /// Constructor name
    #[serde(rename = "Bike")]
    pub bike: String,
    /// Display colour (hex or `rgb(...)`)
    #[serde(rename = "TeamColor", default = "default_color")]
    pub team_color: String,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

/// Older snapshots store a missing position as `""`.
fn lenient_position<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_u64().and_then(|p| u32::try_from(p).ok()))
}

/// Older snapshots store the race number as a bare integer.
fn lenient_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Non-negative JSON number as points, fractional values floored.
fn floored_points(value: &serde_json::Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return Some(u32::try_from(n).unwrap_or(u32::MAX));
    }
    value
        .as_f64()
        .filter(|f| f.is_finite())
        .map(|f| f.max(0.0).floor() as u32)
}

/// Points may have been written as a float (half-points races).
fn lenient_points<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    floored_points(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid Points value {}", value)))
}

/// Whether SPR/RAC columns are meaningful for this season/category.
pub fn sprint_scoring_applies(year: i32, category_name: &str) -> bool {
    year >= SPRINT_INTRODUCED_YEAR && category_name.contains(PREMIER_CLASS_NAME)
}

/// Gap to the leader. The leader (position 1) gets an empty string; ties and
/// anomalous negative gaps render as "0".
pub fn format_gap(position: Option<u32>, leader_points: u32, points: u32) -> String {
    if position == Some(1) {
        return String::new();
    }
    let gap = i64::from(leader_points) - i64::from(points);
    if gap > 0 {
        format!("-{}", gap)
    } else {
        "0".to_string()
    }
}

/// Race number, blank when absent or the literal "none".
pub fn normalize_rider_number(number: Option<&str>) -> String {
    match number.map(str::trim) {
        None => String::new(),
        Some(n) if n.is_empty() || n.eq_ignore_ascii_case("none") => String::new(),
        Some(n) => n.to_string(),
    }
}

/// Flag icon URL from an ISO country code. Without an ISO code the generic
/// unknown flag is used, even when a country name is known.
pub fn flag_url(iso: Option<&str>) -> String {
    let code = iso
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_else(|| UNKNOWN_FLAG_CODE.to_string());
    format!("{}/{}.svg", FLAG_ICON_BASE_URL, code)
}

fn rider_display_name(entry: &StandingEntry) -> String {
    let rider = &entry.rider;
    match rider.full_name.as_deref().map(str::trim) {
        Some(full) if !full.is_empty() => full.to_string(),
        _ => format!(
            "{} {}",
            rider.name.as_deref().unwrap_or_default(),
            rider.surname.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string(),
    }
}

/// Build display rows, one per base standings entry, in the given order.
pub fn assemble_standings(
    entries: &[StandingEntry],
    aggregates: &RiderAggregates,
    sprint_scoring: bool,
) -> Vec<StandingRow> {
    let leader_points = entries.first().and_then(|e| e.points).unwrap_or(0);

    entries
        .iter()
        .map(|entry| {
            let points = entry.points.unwrap_or(0);
            let aggregate = aggregates.get(&entry.rider.id);

            let (sprint_points, race_points) = if sprint_scoring {
                let agg = aggregate.cloned().unwrap_or_default();
                (
                    PointsCell::Scored(agg.sprint_points),
                    PointsCell::Scored(agg.race_points),
                )
            } else {
                (PointsCell::not_applicable(), PointsCell::not_applicable())
            };

            let team_color = aggregate
                .map(|a| a.color.clone())
                .filter(|c| !c.is_empty())
                .or_else(|| entry.team.as_ref().and_then(|t| t.color.clone()))
                .unwrap_or_else(default_color);

            StandingRow {
                position: entry.position,
                rider: rider_display_name(entry),
                number: normalize_rider_number(entry.rider.number.as_deref()),
                points,
                gap: format_gap(entry.position, leader_points, points),
                race_points,
                sprint_points,
                country_flag: flag_url(entry.rider.country_iso.as_deref()),
                team: entry
                    .team
                    .as_ref()
                    .and_then(|t| t.name.clone())
                    .unwrap_or_default(),
                bike: entry
                    .constructor_name
                    .clone()
                    .unwrap_or_else(|| "N/A".to_string()),
                team_color,
            }
        })
        .collect()
}

/// Full fetch → aggregate → assemble pipeline for one season/category.
///
/// `events` are the season's finished events, fetched once per season by the
/// caller. Any standings fetch error propagates; session-level failures are
/// absorbed by the aggregator.
pub async fn build_category_standings(
    client: &MotoGpClient,
    season: &Season,
    category: &Category,
    events: &[Event],
) -> Result<Vec<StandingRow>, AppError> {
    let base = client.get_standings(&season.id, &category.id).await?;
    if base.is_empty() {
        return Ok(Vec::new());
    }

    let sessions = collect_scoring_sessions(client, events, &category.id).await;
    let aggregates = aggregate_sessions(client, &sessions).await;

    tracing::debug!(
        "Season {} / {}: {} standings entries, {} scoring sessions, {} riders aggregated",
        season.year,
        category.name,
        base.len(),
        sessions.len(),
        aggregates.len()
    );

    Ok(assemble_standings(
        &base,
        &aggregates,
        sprint_scoring_applies(season.year, &category.name),
    ))
}
