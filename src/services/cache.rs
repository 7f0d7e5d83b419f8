//! Standings cache.
//!
//! Owns the precomputed `(season, category) → rows` snapshot. A rebuild walks
//! every season up to the most recent one with finished events, builds all
//! categories into a fresh document, and swaps it in only when the whole walk
//! succeeded. Readers clone the current `Arc<Snapshot>` and never observe a
//! partially built document.
//!
//! Lifecycle: EMPTY → REBUILDING → WARM → REBUILDING → WARM ...
//! At most one rebuild runs at a time; the guard is a single-permit semaphore.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::services::motogp::MotoGpClient;
use crate::services::standings::{build_category_standings, StandingRow};
use crate::services::store::{SnapshotDocument, SnapshotStore};

/// Separator between season and category ids in a cache key.
const KEY_SEPARATOR: &str = "__";

/// Compound cache key, rendered as `"{season_id}__{category_id}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub season_id: String,
    pub category_id: String,
}

impl CacheKey {
    pub fn new(season_id: &str, category_id: &str) -> Self {
        Self {
            season_id: season_id.to_string(),
            category_id: category_id.to_string(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.season_id, KEY_SEPARATOR, self.category_id)
    }
}

impl FromStr for CacheKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (season_id, category_id) = s
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| AppError::InternalError(format!("Malformed cache key '{}'", s)))?;
        Ok(Self::new(season_id, category_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    /// No snapshot has been loaded or built yet.
    Empty,
    /// A rebuild is running; reads are served from the previous snapshot.
    Rebuilding,
    /// A complete snapshot is available.
    Warm,
}

/// Outcome of an on-demand refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    Started,
    AlreadyRunning,
}

/// An immutable, complete standings document.
#[derive(Debug)]
pub struct Snapshot {
    pub standings: SnapshotDocument,
    /// When this process started serving the snapshot. For a snapshot loaded
    /// from a store this is the load time, not the original build time.
    pub installed_at: DateTime<Utc>,
    /// "rebuild", or the name of the store it was loaded from.
    pub source: String,
}

/// Cache status, exposed via the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CacheStatus {
    pub state: CacheState,
    pub installed_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
    /// Number of (season, category) keys in the current snapshot.
    pub entries: usize,
    pub total_rebuilds: u64,
    pub last_rebuild_completed_at: Option<DateTime<Utc>>,
    pub last_rebuild_duration_ms: Option<u64>,
    pub last_rebuild_error: Option<String>,
}

#[derive(Debug, Default)]
struct RebuildStats {
    total_rebuilds: u64,
    last_completed_at: Option<DateTime<Utc>>,
    last_duration_ms: Option<u64>,
    last_error: Option<String>,
}

pub struct CacheManager {
    client: MotoGpClient,
    /// Snapshot stores in load priority order.
    stores: Vec<Arc<dyn SnapshotStore>>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    rebuild_lock: Arc<Semaphore>,
    stats: RwLock<RebuildStats>,
}

impl CacheManager {
    pub fn new(client: MotoGpClient, stores: Vec<Arc<dyn SnapshotStore>>) -> Self {
        Self {
            client,
            stores,
            snapshot: RwLock::new(None),
            rebuild_lock: Arc::new(Semaphore::new(1)),
            stats: RwLock::new(RebuildStats::default()),
        }
    }

    pub fn client(&self) -> &MotoGpClient {
        &self.client
    }

    /// The current snapshot, if any has been loaded or built.
    pub async fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().await.clone()
    }

    pub async fn state(&self) -> CacheState {
        if self.rebuild_lock.available_permits() == 0 {
            CacheState::Rebuilding
        } else if self.snapshot.read().await.is_some() {
            CacheState::Warm
        } else {
            CacheState::Empty
        }
    }

    /// Rows for one season/category. Unknown keys yield an empty list;
    /// only a cache that was never warmed is an error.
    pub async fn lookup(
        &self,
        season_id: &str,
        category_id: &str,
    ) -> Result<Vec<StandingRow>, AppError> {
        let snapshot = self.current().await.ok_or(AppError::NotReady)?;
        let key = CacheKey::new(season_id, category_id).to_string();
        Ok(snapshot.standings.get(&key).cloned().unwrap_or_default())
    }

    /// Distinct season ids present in the snapshot, in key order.
    pub async fn season_ids(&self) -> Result<Vec<String>, AppError> {
        let snapshot = self.current().await.ok_or(AppError::NotReady)?;
        let mut ids: Vec<String> = Vec::new();
        for raw in snapshot.standings.keys() {
            match raw.parse::<CacheKey>() {
                Ok(key) => {
                    if !ids.contains(&key.season_id) {
                        ids.push(key.season_id);
                    }
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }
        Ok(ids)
    }

    pub async fn status(&self) -> CacheStatus {
        let state = self.state().await;
        let snapshot = self.current().await;
        let stats = self.stats.read().await;
        CacheStatus {
            state,
            installed_at: snapshot.as_ref().map(|s| s.installed_at),
            source: snapshot.as_ref().map(|s| s.source.clone()),
            entries: snapshot.as_ref().map_or(0, |s| s.standings.len()),
            total_rebuilds: stats.total_rebuilds,
            last_rebuild_completed_at: stats.last_completed_at,
            last_rebuild_duration_ms: stats.last_duration_ms,
            last_rebuild_error: stats.last_error.clone(),
        }
    }

    /// Atomically replace the served snapshot.
    pub async fn install(&self, standings: SnapshotDocument, source: &str) {
        let snapshot = Arc::new(Snapshot {
            standings,
            installed_at: Utc::now(),
            source: source.to_string(),
        });
        *self.snapshot.write().await = Some(snapshot);
    }

    /// Startup: load from the first store that has a snapshot, otherwise
    /// rebuild synchronously. A failed rebuild leaves the cache EMPTY.
    pub async fn load_or_rebuild(&self) {
        for store in &self.stores {
            match store.load().await {
                Ok(Some(doc)) => {
                    tracing::info!(
                        "Loaded standings snapshot with {} keys from {} store",
                        doc.len(),
                        store.name()
                    );
                    self.install(doc, store.name()).await;
                    return;
                }
                Ok(None) => {
                    tracing::info!("No standings snapshot in {} store", store.name());
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load standings snapshot from {} store: {}",
                        store.name(),
                        e
                    );
                }
            }
        }

        tracing::info!("No stored snapshot available, rebuilding standings cache");
        if let Err(e) = self.rebuild().await {
            tracing::error!("Initial standings rebuild failed: {}", e);
        }
    }

    /// Run a rebuild now. Fails with `RebuildInProgress` if one is running.
    /// Returns the number of keys in the new snapshot.
    pub async fn rebuild(&self) -> Result<usize, AppError> {
        let _permit = self.try_permit().ok_or(AppError::RebuildInProgress)?;
        self.rebuild_holding_permit().await
    }

    /// Start a rebuild on a background task unless one is already running.
    pub fn refresh(self: &Arc<Self>) -> RefreshOutcome {
        let Some(permit) = self.try_permit() else {
            tracing::debug!("Refresh requested while a rebuild is in flight");
            return RefreshOutcome::AlreadyRunning;
        };

        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = cache.rebuild_holding_permit().await {
                tracing::error!("Background standings rebuild failed: {}", e);
            }
        });
        RefreshOutcome::Started
    }

    /// Guard that ensures only one rebuild is in progress at a time.
    fn try_permit(&self) -> Option<OwnedSemaphorePermit> {
        self.rebuild_lock.clone().try_acquire_owned().ok()
    }

    async fn rebuild_holding_permit(&self) -> Result<usize, AppError> {
        let started = Instant::now();
        let result = self.build_snapshot().await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(doc) => {
                let keys = doc.len();
                self.persist(&doc).await;
                self.install(doc, "rebuild").await;
                tracing::info!(
                    "Standings rebuild complete: {} keys in {}ms",
                    keys,
                    duration_ms
                );
                Ok(keys)
            }
            Err(e) => {
                tracing::warn!(
                    "Standings rebuild aborted after {}ms, keeping previous snapshot: {}",
                    duration_ms,
                    e
                );
                Err(e)
            }
        };

        let mut stats = self.stats.write().await;
        stats.total_rebuilds += 1;
        stats.last_completed_at = Some(Utc::now());
        stats.last_duration_ms = Some(duration_ms);
        stats.last_error = outcome.as_ref().err().map(|e| e.to_string());

        outcome
    }

    /// Walk seasons newest first and build every category of every season up
    /// to the most recent one with finished events.
    async fn build_snapshot(&self) -> Result<SnapshotDocument, AppError> {
        let mut seasons = self.client.list_seasons().await?;
        seasons.sort_by(|a, b| b.year.cmp(&a.year));
        tracing::info!("Fetched {} seasons", seasons.len());

        let mut events_by_season = HashMap::new();
        let mut cutoff = None;
        for season in &seasons {
            let events = self.client.list_events(&season.id).await?;
            if events.is_empty() {
                tracing::info!("No finished events for season {}, skipping", season.year);
                continue;
            }
            tracing::info!(
                "Season {} has {} finished events; using it as the most recent data year",
                season.year,
                events.len()
            );
            cutoff = Some(season.year);
            events_by_season.insert(season.id.clone(), events);
            break;
        }

        let Some(cutoff) = cutoff else {
            tracing::error!("No season has any finished events; aborting standings rebuild");
            return Err(AppError::NoSeasonData);
        };

        let to_build: Vec<_> = seasons.iter().filter(|s| s.year <= cutoff).collect();
        tracing::info!(
            "Building standings for {} seasons from {} downwards",
            to_build.len(),
            cutoff
        );

        let mut doc = SnapshotDocument::new();
        for season in to_build {
            let events = match events_by_season.remove(&season.id) {
                Some(events) => events,
                None => self.client.list_events(&season.id).await?,
            };
            let categories = self.client.list_categories(&season.id).await?;
            tracing::info!(
                "Season {}: {} categories, {} finished events",
                season.year,
                categories.len(),
                events.len()
            );

            for category in &categories {
                let rows = build_category_standings(&self.client, season, category, &events).await?;
                tracing::debug!(
                    "Built {} rows for season {} / {}",
                    rows.len(),
                    season.year,
                    category.name
                );
                doc.insert(CacheKey::new(&season.id, &category.id).to_string(), rows);
            }
        }

        Ok(doc)
    }

    /// Write the snapshot to every store. Failures are logged only.
    async fn persist(&self, doc: &SnapshotDocument) {
        for store in &self.stores {
            if let Err(e) = store.save(doc).await {
                tracing::warn!(
                    "Failed to save standings snapshot to {} store: {}",
                    store.name(),
                    e
                );
            }
        }
    }
}
