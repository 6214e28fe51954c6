//! Snapshot persistence.
//!
//! Every write replaces the whole snapshot. [`FileStore`] writes to a temp
//! file in the same directory and renames it over the target, so a reader
//! sees either the old snapshot or the new one, never a partial write.

use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Full-replace storage for the roster snapshot.
pub trait Store: Send + Sync {
    /// Read the current snapshot. A store that was never written reads as
    /// empty; one that exists but cannot be decoded is an error.
    fn read(&self) -> Result<Snapshot>;

    /// Replace the stored snapshot.
    fn write(&self, snapshot: &Snapshot) -> Result<()>;
}

/// JSON file store.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// File name used inside a data directory.
    pub const FILE_NAME: &'static str = "roster.json";

    /// Open or create a store inside the given data directory.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        fs::create_dir_all(data_dir.as_ref())?;
        Ok(Self::at(data_dir.as_ref().join(Self::FILE_NAME)))
    }

    /// Store backed by an explicit file path.
    pub fn at<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Store for FileStore {
    fn read(&self) -> Result<Snapshot> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Snapshot::new()),
            Err(e) => {
                return Err(Error::StoreUnreadable(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Snapshot::new());
        }

        serde_json::from_slice(&raw)
            .map_err(|e| Error::StoreUnreadable(format!("{}: {}", self.path.display(), e)))
    }

    fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let data = serde_json::to_vec_pretty(snapshot)?;
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let context = |what: &str, e: io::Error| {
            Error::StoreWrite(format!("{} {}: {}", what, self.path.display(), e))
        };

        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| context("creating temp file for", e))?;
        temp.write_all(&data)
            .map_err(|e| context("writing temp file for", e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| context("syncing temp file for", e))?;
        temp.persist(&self.path)
            .map_err(|e| context("renaming temp file to", e.error))?;

        tracing::debug!("Wrote {} members to {:?}", snapshot.len(), self.path);
        Ok(())
    }
}

/// In-memory store for tests and throwaway nodes.
///
/// Reads and writes can be made to fail on demand.
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Snapshot>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with an existing snapshot.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            ..Self::default()
        }
    }

    /// Make subsequent reads fail as unreadable.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, Snapshot>> {
        self.snapshot
            .lock()
            .map_err(|_| Error::StoreUnreadable("memory store poisoned".into()))
    }
}

impl Store for MemoryStore {
    fn read(&self) -> Result<Snapshot> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::StoreUnreadable("memory store read disabled".into()));
        }
        Ok(self.locked()?.clone())
    }

    fn write(&self, snapshot: &Snapshot) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::StoreWrite("memory store write disabled".into()));
        }
        *self.locked()? = snapshot.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    fn read(&self) -> Result<Snapshot> {
        (**self).read()
    }

    fn write(&self, snapshot: &Snapshot) -> Result<()> {
        (**self).write(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn sample() -> Snapshot {
        let mut snapshot = Snapshot::new();
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        snapshot.join("alice", t0);
        snapshot.join("bob", t0);
        snapshot.challenge_active();
        snapshot.confirm("bob", t0);
        snapshot
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.write(&sample()).unwrap();
        assert_eq!(store.read().unwrap(), sample());
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("nested")).unwrap();
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn blank_file_reads_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        fs::write(store.path(), "\n").unwrap();
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.read(), Err(Error::StoreUnreadable(_))));
    }

    #[test]
    fn write_replaces_whole_snapshot() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.write(&sample()).unwrap();

        let mut smaller = sample();
        smaller.leave("alice");
        store.write(&smaller).unwrap();

        let loaded = store.read().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(!loaded.contains("alice"));
        // No temp files left next to the snapshot.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn reads_legacy_data_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        fs::write(
            store.path(),
            r#"{
  "1234": { "status": "inactive", "joinedAt": "2024-03-01T12:00:00.000Z", "pendingCheck": true }
}"#,
        )
        .unwrap();

        let loaded = store.read().unwrap();
        assert!(loaded.get("1234").unwrap().pending_check());
    }

    #[test]
    fn memory_store_failure_switches() {
        let store = MemoryStore::with_snapshot(sample());
        store.set_fail_reads(true);
        assert!(store.read().is_err());
        store.set_fail_reads(false);
        assert_eq!(store.read().unwrap(), sample());

        store.set_fail_writes(true);
        assert!(store.write(&Snapshot::new()).is_err());
        assert_eq!(store.write_count(), 0);
    }
}
