//! File-backed time-series history with retention and throttled sampling.

use std::{collections::BTreeMap, fs, path::PathBuf, sync::Mutex};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Points at or below `now - RETENTION_MS` are evicted on every write.
pub const RETENTION_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Default minimum spacing between sampled points (one hour).
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 60 * 60 * 1000;

/// One sampled observation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HistoryPoint {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub value: f64,
}

/// Named scalar series, insertion-ordered points.
pub type SeriesMap = BTreeMap<String, Vec<HistoryPoint>>;

/// Persistent store of named scalar time series, backed by one JSON
/// snapshot rewritten atomically on every change.
pub struct History {
    path: PathBuf,
    // Serializes every read-modify-write cycle. Each write rewrites the whole
    // snapshot, so concurrent handler tasks on any keys would lose updates
    // without this.
    write_lock: Mutex<()>,
}

impl History {
    /// Create a store persisting to `history.json` under `state_root`.
    pub fn new(state_root: PathBuf) -> Self {
        Self {
            path: state_root.join("history.json"),
            write_lock: Mutex::new(()),
        }
    }

    /// Series map used when no snapshot exists yet.
    fn default_map() -> SeriesMap {
        let mut map = SeriesMap::new();
        map.insert("wallet".into(), vec![]);
        map.insert("trust".into(), vec![]);
        map
    }

    /// Load the persisted snapshot. Total: a missing or unreadable file
    /// yields the default empty mapping, which the next write overwrites.
    pub fn load(&self) -> SeriesMap {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_else(Self::default_map)
    }

    /// Persist the full mapping with a replace-on-write so a concurrent
    /// reader never observes a partial file.
    fn save(&self, map: &SeriesMap) -> Result<()> {
        let parent = self
            .path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent)?;
        let tmp = tempfile::NamedTempFile::new_in(&parent)?;
        serde_json::to_writer(&tmp, map)?;
        tmp.persist(&self.path)?;
        Ok(())
    }

    /// Append `{now_ms, value}` to `key` (created on first write) and evict
    /// every point older than the retention window, across all series.
    pub fn append_point(&self, key: &str, value: f64, now_ms: u64) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut map = self.load();
        Self::push_and_prune(&mut map, key, value, now_ms);
        self.save(&map)
    }

    /// Record a point only when the series is empty or its last point is
    /// older than `min_interval_ms`. Returns whether a point was written.
    ///
    /// Only the last stored point is consulted, so a process restart inside
    /// the window can admit one extra point right after startup.
    pub fn maybe_sample(
        &self,
        key: &str,
        value: f64,
        now_ms: u64,
        min_interval_ms: u64,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap();
        let mut map = self.load();
        let fresh = map
            .get(key)
            .and_then(|series| series.last())
            .map_or(false, |last| {
                last.timestamp >= now_ms.saturating_sub(min_interval_ms)
            });
        if fresh {
            return Ok(false);
        }
        Self::push_and_prune(&mut map, key, value, now_ms);
        self.save(&map)?;
        Ok(true)
    }

    fn push_and_prune(map: &mut SeriesMap, key: &str, value: f64, now_ms: u64) {
        map.entry(key.to_string()).or_default().push(HistoryPoint {
            timestamp: now_ms,
            value,
        });
        if let Some(cutoff) = now_ms.checked_sub(RETENTION_MS) {
            for series in map.values_mut() {
                series.retain(|p| p.timestamp > cutoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn history(dir: &TempDir) -> History {
        History::new(dir.path().to_path_buf())
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = TempDir::new().unwrap();
        let map = history(&dir).load();
        assert_eq!(map.len(), 2);
        assert!(map["wallet"].is_empty());
        assert!(map["trust"].is_empty());
    }

    #[test]
    fn load_corrupt_returns_default() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("history.json"), "{not json").unwrap();
        let map = history(&dir).load();
        assert!(map["wallet"].is_empty());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let h = history(&dir);
        h.append_point("wallet", 1234.0, 10).unwrap();
        let map = h.load();
        assert_eq!(
            map["wallet"],
            vec![HistoryPoint {
                timestamp: 10,
                value: 1234.0
            }]
        );
        // save(load()) leaves the content unchanged
        h.save(&map).unwrap();
        assert_eq!(h.load(), map);
    }

    #[test]
    fn corrupt_snapshot_is_overwritten_on_next_write() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("history.json"), "garbage").unwrap();
        let h = history(&dir);
        h.append_point("trust", 50.0, 1).unwrap();
        let map = h.load();
        assert_eq!(map["trust"].len(), 1);
        assert!(map["wallet"].is_empty());
    }

    #[test]
    fn append_prunes_beyond_retention() {
        let dir = TempDir::new().unwrap();
        let h = history(&dir);
        h.append_point("wallet", 1.0, 1_000).unwrap();
        let now = 1_000 + RETENTION_MS;
        h.append_point("wallet", 2.0, now).unwrap();
        let map = h.load();
        // 1_000 <= now - RETENTION_MS, so the old point is gone
        assert_eq!(map["wallet"].len(), 1);
        assert_eq!(map["wallet"][0].timestamp, now);
    }

    #[test]
    fn append_prunes_across_series() {
        let dir = TempDir::new().unwrap();
        let h = history(&dir);
        h.append_point("wallet", 1.0, 500).unwrap();
        h.append_point("trust", 2.0, 500 + RETENTION_MS + 1).unwrap();
        let map = h.load();
        assert!(map["wallet"].is_empty());
        assert_eq!(map["trust"].len(), 1);
    }

    #[test]
    fn no_pruning_before_window_has_elapsed() {
        let dir = TempDir::new().unwrap();
        let h = history(&dir);
        h.append_point("wallet", 1.0, 0).unwrap();
        h.append_point("wallet", 2.0, 10).unwrap();
        assert_eq!(h.load()["wallet"].len(), 2);
    }

    #[test]
    fn maybe_sample_is_idempotent_within_interval() {
        let dir = TempDir::new().unwrap();
        let h = history(&dir);
        assert!(h
            .maybe_sample("wallet", 10.0, 5_000, DEFAULT_SAMPLE_INTERVAL_MS)
            .unwrap());
        assert!(!h
            .maybe_sample("wallet", 11.0, 5_000, DEFAULT_SAMPLE_INTERVAL_MS)
            .unwrap());
        assert_eq!(h.load()["wallet"].len(), 1);
    }

    #[test]
    fn maybe_sample_throttles_then_records() {
        let dir = TempDir::new().unwrap();
        let h = history(&dir);
        h.append_point("trust", 50.0, 0).unwrap();

        assert!(!h
            .maybe_sample("trust", 60.0, 1_000, DEFAULT_SAMPLE_INTERVAL_MS)
            .unwrap());
        let map = h.load();
        assert_eq!(map["trust"].len(), 1);
        assert_eq!(map["trust"][0].value, 50.0);

        assert!(h
            .maybe_sample("trust", 60.0, 3_700_000, DEFAULT_SAMPLE_INTERVAL_MS)
            .unwrap());
        let map = h.load();
        assert_eq!(map["trust"].len(), 2);
        assert_eq!(
            map["trust"][1],
            HistoryPoint {
                timestamp: 3_700_000,
                value: 60.0
            }
        );
    }

    #[test]
    fn maybe_sample_creates_missing_series() {
        let dir = TempDir::new().unwrap();
        let h = history(&dir);
        assert!(h
            .maybe_sample("uptime", 1.0, 42, DEFAULT_SAMPLE_INTERVAL_MS)
            .unwrap());
        assert_eq!(h.load()["uptime"].len(), 1);
    }
}
