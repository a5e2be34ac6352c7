//! The single persisted "last relayed output" value.

use std::path::{Path, PathBuf};

use deskbridge_core::error::Result;
use deskbridge_core::model::OutputSnapshot;
use deskbridge_core::{unix_secs, BridgeError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// On-disk record. Field names and the float-seconds timestamp are kept stable so older
/// state files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub last_response: String,
    pub timestamp: f64,
}

impl From<&OutputSnapshot> for SnapshotRecord {
    fn from(s: &OutputSnapshot) -> Self {
        Self {
            last_response: s.text.clone(),
            timestamp: unix_secs(s.captured_at_ms),
        }
    }
}

impl From<SnapshotRecord> for OutputSnapshot {
    fn from(r: SnapshotRecord) -> Self {
        Self {
            text: r.last_response,
            captured_at_ms: (r.timestamp * 1000.0).round() as i64,
        }
    }
}

/// Deduplication baseline for the watcher.
///
/// Reads are free for anyone; the only write path is [`SnapshotStore::compare_and_set_snapshot`].
pub struct SnapshotStore {
    path: Option<PathBuf>,
    current: Mutex<OutputSnapshot>,
}

impl SnapshotStore {
    pub fn in_memory() -> Self {
        Self::seeded(OutputSnapshot::default())
    }

    /// In-memory store starting from `snapshot`.
    pub fn seeded(snapshot: OutputSnapshot) -> Self {
        Self {
            path: None,
            current: Mutex::new(snapshot),
        }
    }

    /// File-backed store. A missing or unreadable file starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match load_record(&path).await {
            Ok(Some(snap)) => {
                info!(path = %path.display(), chars = snap.text.chars().count(), "loaded last relayed output");
                snap
            }
            Ok(None) => OutputSnapshot::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable snapshot file");
                OutputSnapshot::default()
            }
        };
        Self {
            path: Some(path),
            current: Mutex::new(current),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn get_snapshot(&self) -> OutputSnapshot {
        self.current.lock().await.clone()
    }

    /// Replaces the snapshot with `next` iff its text still equals `expected`.
    ///
    /// Returns `Ok(false)` when another writer got there first. The in-memory value always
    /// advances on a match; a failed file write is reported afterwards as `Persistence`.
    pub async fn compare_and_set_snapshot(
        &self,
        expected: &OutputSnapshot,
        next: OutputSnapshot,
    ) -> Result<bool> {
        let mut cur = self.current.lock().await;
        if cur.text != expected.text {
            return Ok(false);
        }
        let written = match &self.path {
            Some(path) => persist(path, &next).await,
            None => Ok(()),
        };
        *cur = next;
        written.map(|()| true)
    }
}

async fn load_record(path: &Path) -> Result<Option<OutputSnapshot>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(BridgeError::persistence(e)),
    };
    let rec: SnapshotRecord = serde_json::from_slice(&bytes).map_err(BridgeError::persistence)?;
    Ok(Some(rec.into()))
}

async fn persist(path: &Path, snap: &OutputSnapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(BridgeError::persistence)?;
    }
    let body = serde_json::to_vec_pretty(&SnapshotRecord::from(snap))
        .map_err(BridgeError::persistence)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, body)
        .await
        .map_err(BridgeError::persistence)?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(BridgeError::persistence)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(text: &str, at: i64) -> OutputSnapshot {
        OutputSnapshot {
            text: text.into(),
            captured_at_ms: at,
        }
    }

    #[tokio::test]
    async fn cas_rejects_stale_expectation() {
        let store = SnapshotStore::seeded(snap("first output here", 1));
        let stale = snap("something else", 0);
        assert!(!store
            .compare_and_set_snapshot(&stale, snap("next", 2))
            .await
            .unwrap());
        assert_eq!(store.get_snapshot().await.text, "first output here");
    }

    #[tokio::test]
    async fn file_roundtrip_uses_legacy_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("last_response.json");

        let store = SnapshotStore::open(&path).await;
        assert!(store.get_snapshot().await.is_empty());
        let prev = store.get_snapshot().await;
        assert!(store
            .compare_and_set_snapshot(&prev, snap("relayed text value", 1_700_000_000_500))
            .await
            .unwrap());

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["last_response"], "relayed text value");
        assert_eq!(raw["timestamp"].as_f64(), Some(1_700_000_000.5));

        let reopened = SnapshotStore::open(&path).await;
        assert_eq!(
            reopened.get_snapshot().await,
            snap("relayed text value", 1_700_000_000_500)
        );
    }

    #[tokio::test]
    async fn failed_write_still_advances_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let store = SnapshotStore::open(blocker.join("last_response.json")).await;

        let prev = store.get_snapshot().await;
        let res = store
            .compare_and_set_snapshot(&prev, snap("delivered output", 5))
            .await;
        assert!(matches!(res, Err(BridgeError::Persistence(_))));
        assert_eq!(store.get_snapshot().await.text, "delivered output");
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_response.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = SnapshotStore::open(&path).await;
        assert!(store.get_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn reads_file_written_by_older_bridge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_response.json");
        std::fs::write(
            &path,
            br#"{"last_response": "hello from before", "timestamp": 1712345678.25}"#,
        )
        .unwrap();
        let store = SnapshotStore::open(&path).await;
        let s = store.get_snapshot().await;
        assert_eq!(s.text, "hello from before");
        assert_eq!(s.captured_at_ms, 1_712_345_678_250);
    }
}
