// Cache store for per-kind record listings.
// In-memory snapshots scoped to one connection, with JSON file persistence.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::error::Result;
use crate::records::{Record, RecordKind};

use super::paths;

/// Wrapper for a persisted snapshot with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    /// The cached data.
    pub data: T,
    /// When the data was cached.
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }
}

/// Read a cached JSON snapshot from a file.
pub fn read_cached<T: DeserializeOwned>(path: &Path) -> Result<Option<CachedData<T>>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)?;
    let cached: CachedData<T> = serde_json::from_str(&contents)?;
    Ok(Some(cached))
}

/// Write a snapshot to cache as JSON, atomically via a temp file.
pub fn write_cached<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let cached = CachedData::new(data);
    let json = serde_json::to_string(&cached)?;

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Listing snapshots for one connection, keyed by record kind.
///
/// A kind that was never populated reads as `None`, distinct from a kind
/// populated with zero records. Each `set` replaces the kind's snapshot
/// wholesale; partial merges do not exist.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: HashMap<RecordKind, Vec<Record>>,
    persist_dir: Option<PathBuf>,
}

impl CacheStore {
    /// In-memory only store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store mirrored to `dir`, rehydrated from any snapshots already there.
    /// Unreadable snapshots are discarded, not fatal.
    pub fn load(dir: PathBuf) -> Self {
        let mut entries = HashMap::new();
        for kind in RecordKind::ALL {
            match read_cached::<Vec<Record>>(&paths::kind_path(&dir, kind)) {
                Ok(Some(cached)) => {
                    entries.insert(kind, cached.data);
                }
                Ok(None) => {}
                Err(error) => warn!(%kind, %error, "discarding unreadable cache snapshot"),
            }
        }
        Self {
            entries,
            persist_dir: Some(dir),
        }
    }

    /// Snapshot for a kind. `None` means never populated.
    pub fn get(&self, kind: RecordKind) -> Option<&[Record]> {
        self.entries.get(&kind).map(Vec::as_slice)
    }

    /// Replace a kind's snapshot wholesale and mirror it to disk.
    pub fn set(&mut self, kind: RecordKind, items: Vec<Record>) {
        if let Some(dir) = &self.persist_dir {
            if let Err(error) = write_cached(&paths::kind_path(dir, kind), &items) {
                warn!(%kind, %error, "cache snapshot not persisted");
            }
        }
        self.entries.insert(kind, items);
    }

    /// Drop one kind's snapshot, in memory and on disk.
    pub fn clear(&mut self, kind: RecordKind) {
        self.entries.remove(&kind);
        if let Some(dir) = &self.persist_dir {
            let path = paths::kind_path(dir, kind);
            if path.exists() {
                if let Err(error) = fs::remove_file(&path) {
                    warn!(%kind, %error, "cache snapshot not removed");
                }
            }
        }
    }

    /// Drop every kind's snapshot (used when disconnecting or purging
    /// credentials).
    pub fn clear_all(&mut self) {
        for kind in RecordKind::ALL {
            self.clear(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RawRecord;
    use crate::timefmt::DisplayFormats;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_record() -> Record {
        let raw: RawRecord = serde_json::from_value(json!({
            "sys_class_name": "sys_script_include",
            "sys_id": "0001",
            "sys_updated_on": "2026-01-15 10:00:00",
            "sys_created_on": "2026-01-15 10:00:00",
            "name": "Util",
            "script": "var Util;"
        }))
        .unwrap();
        Record::from_raw(raw, &DisplayFormats::default()).unwrap()
    }

    #[test]
    fn test_absent_vs_empty() {
        let mut store = CacheStore::new();
        assert!(store.get(RecordKind::Widget).is_none());

        store.set(RecordKind::Widget, Vec::new());
        assert_eq!(store.get(RecordKind::Widget), Some(&[][..]));
    }

    #[test]
    fn test_set_replaces_wholesale() {
        let mut store = CacheStore::new();
        store.set(RecordKind::ScriptInclude, vec![sample_record(), sample_record()]);
        store.set(RecordKind::ScriptInclude, vec![sample_record()]);
        assert_eq!(store.get(RecordKind::ScriptInclude).unwrap().len(), 1);
    }

    #[test]
    fn test_clear_and_clear_all() {
        let mut store = CacheStore::new();
        store.set(RecordKind::ScriptInclude, vec![sample_record()]);
        store.set(RecordKind::Theme, Vec::new());

        store.clear(RecordKind::ScriptInclude);
        assert!(store.get(RecordKind::ScriptInclude).is_none());
        assert!(store.get(RecordKind::Theme).is_some());

        store.clear_all();
        assert!(store.get(RecordKind::Theme).is_none());
    }

    #[test]
    fn test_persistence_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();

        let mut store = CacheStore::load(dir.clone());
        store.set(RecordKind::ScriptInclude, vec![sample_record()]);
        store.set(RecordKind::Widget, Vec::new());

        let reloaded = CacheStore::load(dir);
        assert_eq!(reloaded.get(RecordKind::ScriptInclude).unwrap().len(), 1);
        assert_eq!(
            reloaded.get(RecordKind::ScriptInclude).unwrap()[0],
            sample_record()
        );
        // Populated-but-empty survives reload; never-populated stays absent.
        assert_eq!(reloaded.get(RecordKind::Widget), Some(&[][..]));
        assert!(reloaded.get(RecordKind::Theme).is_none());
    }

    #[test]
    fn test_clear_removes_snapshot_file() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();

        let mut store = CacheStore::load(dir.clone());
        store.set(RecordKind::Theme, vec![sample_record()]);
        store.clear(RecordKind::Theme);

        let reloaded = CacheStore::load(dir);
        assert!(reloaded.get(RecordKind::Theme).is_none());
    }
}
