//! Per-rider sprint/race point totals across a season's scoring sessions.
//!
//! Session classifications are fetched concurrently with a bounded fan-out
//! and folded in completion order. The stored colour is overwritten by every
//! entry seen, so when a rider's colour differs between sessions the final
//! value depends on which fetch finished last.

use std::collections::HashMap;

use futures::stream::{self, StreamExt};

use crate::services::color::resolve_color;
use crate::services::motogp::{ClassificationEntry, Event, MotoGpClient, Session, SessionType};

/// Upper bound on concurrent session classification fetches.
const MAX_CLASSIFICATION_FETCHES: usize = 20;

/// Upper bound on concurrent session listing fetches (one per event).
const MAX_SESSION_LIST_FETCHES: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiderAggregate {
    pub sprint_points: u32,
    pub race_points: u32,
    /// Last colour resolved for this rider.
    pub color: String,
}

/// Rider id → aggregate.
pub type RiderAggregates = HashMap<String, RiderAggregate>;

/// Fold one session's classification into the running aggregates.
/// Sessions that are neither sprint nor race leave the aggregates untouched.
pub fn fold_classification(
    aggregates: &mut RiderAggregates,
    session_type: &SessionType,
    entries: &[ClassificationEntry],
) {
    let is_sprint = match session_type {
        SessionType::Sprint => true,
        SessionType::Race => false,
        SessionType::Other(code) => {
            tracing::debug!("Ignoring classification of non-scoring session type {}", code);
            return;
        }
    };

    for entry in entries {
        let agg = aggregates.entry(entry.rider_id.clone()).or_default();
        if is_sprint {
            agg.sprint_points = agg.sprint_points.saturating_add(entry.points);
        } else {
            agg.race_points = agg.race_points.saturating_add(entry.points);
        }
        agg.color = resolve_color(&entry.color);
    }
}

/// Fetch every scoring session's classification and fold them per rider.
///
/// A failed fetch is logged and skipped; it never aborts the others.
pub async fn aggregate_sessions(client: &MotoGpClient, sessions: &[Session]) -> RiderAggregates {
    let mut aggregates = RiderAggregates::new();

    let scoring: Vec<Session> = sessions
        .iter()
        .filter(|s| s.session_type.is_scoring())
        .cloned()
        .collect();
    if scoring.is_empty() {
        return aggregates;
    }

    let workers = scoring.len().min(MAX_CLASSIFICATION_FETCHES);
    let mut completed = stream::iter(scoring.into_iter().map(|session| {
        let client = client.clone();
        async move {
            let result = client.get_session_classification(&session.id).await;
            (session, result)
        }
    }))
    .buffer_unordered(workers);

    while let Some((session, result)) = completed.next().await {
        match result {
            Ok(entries) => fold_classification(&mut aggregates, &session.session_type, &entries),
            Err(e) => {
                tracing::warn!(
                    "Skipping classification of session {} ({:?}): {}",
                    session.id,
                    session.session_type,
                    e
                );
            }
        }
    }

    aggregates
}

/// List the sprint/race sessions of every event for one category.
///
/// Listing failures for individual events are logged and skipped.
pub async fn collect_scoring_sessions(
    client: &MotoGpClient,
    events: &[Event],
    category_id: &str,
) -> Vec<Session> {
    let mut sessions = Vec::new();
    let mut listed = stream::iter(events.iter().cloned().map(|event| {
        let client = client.clone();
        let category_id = category_id.to_string();
        async move {
            let result = client.list_sessions(&event.id, &category_id).await;
            (event, result)
        }
    }))
    .buffer_unordered(MAX_SESSION_LIST_FETCHES);

    while let Some((event, result)) = listed.next().await {
        match result {
            Ok(found) => sessions.extend(found),
            Err(e) => {
                tracing::warn!(
                    "Skipping sessions of event {} for category {}: {}",
                    event.id,
                    category_id,
                    e
                );
            }
        }
    }

    sessions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::color::DEFAULT_COLOR;
    use crate::services::motogp::ColorHint;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(rider: &str, points: u32, color: Option<&str>) -> ClassificationEntry {
        ClassificationEntry {
            rider_id: rider.to_string(),
            points,
            color: ColorHint {
                team_color: color.map(str::to_string),
                ..ColorHint::default()
            },
        }
    }

    fn session(id: &str, session_type: SessionType) -> Session {
        Session {
            id: id.to_string(),
            session_type,
        }
    }

    #[test]
    fn test_fold_sums_by_session_type() {
        let mut aggs = RiderAggregates::new();
        fold_classification(&mut aggs, &SessionType::Sprint, &[entry("r1", 12, None)]);
        fold_classification(&mut aggs, &SessionType::Race, &[entry("r1", 25, None)]);
        fold_classification(&mut aggs, &SessionType::Race, &[entry("r1", 20, None)]);

        let r1 = &aggs["r1"];
        assert_eq!(r1.sprint_points, 12);
        assert_eq!(r1.race_points, 45);
    }

    #[test]
    fn test_fold_ignores_other_session_types() {
        let mut aggs = RiderAggregates::new();
        fold_classification(&mut aggs, &SessionType::Race, &[entry("r1", 25, Some("#111111"))]);
        let before = aggs.clone();

        fold_classification(
            &mut aggs,
            &SessionType::Other("FP1".into()),
            &[entry("r1", 99, Some("#999999")), entry("r2", 50, None)],
        );

        assert_eq!(aggs, before);
    }

    #[test]
    fn test_fold_last_color_wins() {
        let mut aggs = RiderAggregates::new();
        fold_classification(&mut aggs, &SessionType::Race, &[entry("r1", 0, Some("#aaaaaa"))]);
        fold_classification(&mut aggs, &SessionType::Sprint, &[entry("r1", 0, Some("#bbbbbb"))]);
        assert_eq!(aggs["r1"].color, "#bbbbbb");
    }

    #[test]
    fn test_fold_color_falls_back_to_default() {
        let mut aggs = RiderAggregates::new();
        fold_classification(&mut aggs, &SessionType::Race, &[entry("r1", 3, None)]);
        assert_eq!(aggs["r1"].color, DEFAULT_COLOR);
    }

    #[tokio::test]
    async fn test_aggregate_empty_sessions() {
        let client = MotoGpClient::new("http://127.0.0.1:9").unwrap();
        assert!(aggregate_sessions(&client, &[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_aggregate_skips_failed_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session/spr1/classification"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "classification": [
                    {"rider": {"id": "r1"}, "points": 12},
                    {"rider": {"id": "r2"}, "points": 9}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/session/rac1/classification"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/session/rac2/classification"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "classification": [{"rider": {"id": "r1"}, "points": 25}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/session/fp1/classification"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "classification": [{"rider": {"id": "r1"}, "points": 100}]
            })))
            .expect(0)
            .mount(&server)
            .await;

        let client = MotoGpClient::new(&server.uri()).unwrap();
        let sessions = vec![
            session("spr1", SessionType::Sprint),
            session("rac1", SessionType::Race),
            session("rac2", SessionType::Race),
            session("fp1", SessionType::Other("FP".into())),
        ];
        let aggs = aggregate_sessions(&client, &sessions).await;

        assert_eq!(aggs["r1"].sprint_points, 12);
        assert_eq!(aggs["r1"].race_points, 25);
        assert_eq!(aggs["r2"].sprint_points, 9);
        assert_eq!(aggs["r2"].race_points, 0);
    }

    #[tokio::test]
    async fn test_collect_sessions_skips_failed_event() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions"))
            .and(wiremock::matchers::query_param("eventUuid", "e1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "s1", "type": "RAC"},
                {"id": "s2", "type": "WUP"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sessions"))
            .and(wiremock::matchers::query_param("eventUuid", "e2"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = MotoGpClient::new(&server.uri()).unwrap();
        let events = vec![Event { id: "e1".into() }, Event { id: "e2".into() }];
        let sessions = collect_scoring_sessions(&client, &events, "c1").await;

        assert_eq!(sessions, vec![session("s1", SessionType::Race)]);
    }
}
