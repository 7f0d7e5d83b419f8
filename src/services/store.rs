//! Durable snapshot stores for the standings cache.
//!
//! The snapshot document is a single JSON object keyed by
//! `"{season_id}__{category_id}"` whose values are arrays of standings rows.
//! It is written to every configured store after a successful rebuild and read
//! back in store priority order on startup.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::services::standings::StandingRow;

/// Persisted form of the cache.
pub type SnapshotDocument = BTreeMap<String, Vec<StandingRow>>;

/// Redis key holding the serialized snapshot.
const REDIS_SNAPSHOT_KEY: &str = "motogp:standings_cache";

/// Bound on establishing a redis connection.
const REDIS_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timed out connecting to {0}")]
    Timeout(&'static str),
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Short backend name used in logs and the cache status.
    fn name(&self) -> &'static str;

    /// Read the stored snapshot. `Ok(None)` when nothing is stored.
    async fn load(&self) -> Result<Option<SnapshotDocument>, StoreError>;

    async fn save(&self, snapshot: &SnapshotDocument) -> Result<(), StoreError>;
}

/// Snapshot kept in an external redis instance, with an expiration.
pub struct RedisSnapshotStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisSnapshotStore {
    pub fn new(url: &str, ttl_secs: u64) -> Result<Self, StoreError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            ttl_secs,
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        tokio::time::timeout(
            Duration::from_secs(REDIS_CONNECT_TIMEOUT_SECS),
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| StoreError::Timeout("redis"))?
        .map_err(StoreError::from)
    }
}

#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn load(&self) -> Result<Option<SnapshotDocument>, StoreError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(REDIS_SNAPSHOT_KEY).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &SnapshotDocument) -> Result<(), StoreError> {
        let payload = serde_json::to_string(snapshot)?;
        let mut conn = self.connection().await?;
        if self.ttl_secs > 0 {
            let _: () = conn
                .set_ex(REDIS_SNAPSHOT_KEY, payload, self.ttl_secs)
                .await?;
        } else {
            let _: () = conn.set(REDIS_SNAPSHOT_KEY, payload).await?;
        }
        Ok(())
    }
}

/// Snapshot kept in a local JSON file.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load(&self) -> Result<Option<SnapshotDocument>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, snapshot: &SnapshotDocument) -> Result<(), StoreError> {
        let payload = serde_json::to_vec_pretty(snapshot)?;
        // Write next to the target, then rename, so readers never see a
        // half-written file.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, payload).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!("Stored standings snapshot to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::standings::PointsCell;

    fn row(name: &str) -> StandingRow {
        StandingRow {
            position: Some(1),
            rider: name.to_string(),
            number: "93".to_string(),
            points: 25,
            gap: String::new(),
            race_points: PointsCell::Scored(25),
            sprint_points: PointsCell::Scored(0),
            country_flag: "https://flagicons.lipis.dev/flags/4x3/es.svg".to_string(),
            team: "Repsol Honda".to_string(),
            bike: "Honda".to_string(),
            team_color: "#ff6600".to_string(),
        }
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("absent.json"));
        assert!(tokio_test::assert_ok!(store.load().await).is_none());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("cache.json"));
        let mut doc = SnapshotDocument::new();
        doc.insert("s1__c1".to_string(), vec![row("Marc Marquez")]);
        doc.insert("s1__c2".to_string(), Vec::new());

        tokio_test::assert_ok!(store.save(&doc).await);
        let loaded = store.load().await.unwrap().unwrap();

        assert_eq!(loaded, doc);
        assert!(!dir.path().join("cache.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileSnapshotStore::new(&path);
        assert!(matches!(store.load().await, Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn test_file_store_reads_legacy_flag_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(
            &path,
            r##"{"s__c": [{"P": 1, "Rider": "A", "#": "7", "Points": 10, "Def.": "",
                 "RAC": "-", "SPR": "-", "Flag": "https://flagicons.lipis.dev/flags/4x3/fr.svg",
                 "Team": "T", "Bike": "B", "TeamColor": "#010203"}]}"##,
        )
        .unwrap();

        let loaded = FileSnapshotStore::new(&path).load().await.unwrap().unwrap();
        let rows = &loaded["s__c"];
        assert_eq!(
            rows[0].country_flag,
            "https://flagicons.lipis.dev/flags/4x3/fr.svg"
        );
        assert_eq!(rows[0].sprint_points, PointsCell::not_applicable());
    }

    #[tokio::test]
    async fn test_file_store_reads_numeric_number_and_float_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("standings_cache.json");
        std::fs::write(
            &path,
            r##"{"s__c": [
                {"P": 1, "Rider": "Marc Marquez", "#": 93, "Points": 345.5, "Def.": "",
                 "RAC": 210.5, "SPR": 135, "Flag": "https://flagicons.lipis.dev/flags/4x3/es.svg",
                 "Team": "Repsol Honda", "Bike": "Honda", "TeamColor": "#ff6600"},
                {"P": 2, "Rider": "Unknown", "#": "", "Points": 0, "Def.": "-345",
                 "RAC": 0, "SPR": 0, "Flag": "https://flagicons.lipis.dev/flags/4x3/xx.svg",
                 "Team": "", "Bike": "N/A", "TeamColor": "#ddd"}
            ]}"##,
        )
        .unwrap();

        let loaded = tokio_test::assert_ok!(FileSnapshotStore::new(&path).load().await).unwrap();
        let rows = &loaded["s__c"];
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].number, "93");
        assert_eq!(rows[0].points, 345);
        assert_eq!(rows[0].race_points, PointsCell::Scored(210));
        assert_eq!(rows[0].sprint_points, PointsCell::Scored(135));
        assert_eq!(rows[1].number, "");
    }

    #[test]
    fn test_redis_store_rejects_bad_url() {
        assert!(matches!(
            RedisSnapshotStore::new("not a url", 60),
            Err(StoreError::Redis(_))
        ));
    }
}
