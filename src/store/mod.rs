//! File-backed session store.
//!
//! One JSON document per session, guarded by an exclusive advisory lock so
//! threads and processes sharing the dataset file serialize their mutations.
//! Every write goes through a temp file and atomic rename, with the previous
//! live file rotated into `.bak.N` slots first, so a crash at any point
//! leaves either the pre-mutation or post-mutation state on disk.
//!
//! Readers do not take the lock: a whole-file read of an atomically renamed
//! file observes either the old or the new document, never a mix.

mod lockfile;

pub use lockfile::{write_atomic, LockGuard};

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{RecoveryPolicy, StorageConfig};
use crate::error::{StoreError, StoreResult};
use crate::model::{Dataset, ThoughtRecord};

/// Name of the live dataset file inside the storage directory.
const DATASET_FILE: &str = "session.json";
/// Name of the lock file inside the storage directory.
const LOCK_FILE: &str = "session.lock";

/// Durable, concurrency-safe custody of one session dataset.
///
/// Mutations re-read the live file under the lock before applying, so
/// several store instances (or processes) pointed at the same directory
/// stay coherent without any shared in-memory state.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dataset_path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
    backup_count: usize,
    recovery: RecoveryPolicy,
}

impl SessionStore {
    /// Open a store over the configured directory, creating it if needed
    pub fn open(config: &StorageConfig) -> StoreResult<Self> {
        fs::create_dir_all(&config.dir)?;

        Ok(Self {
            dataset_path: config.dir.join(DATASET_FILE),
            lock_path: config.dir.join(LOCK_FILE),
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
            backup_count: config.backup_count.max(1),
            recovery: config.recovery,
        })
    }

    /// Path of the live dataset file
    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    /// Append a validated record and persist the dataset durably.
    ///
    /// Stamps the record's timestamp, updates the latest declared total,
    /// and returns the stored copy. Signals
    /// [`StoreError::DuplicateNumber`] if the number is already taken;
    /// the on-disk dataset is untouched on any failure.
    pub fn append(&self, record: ThoughtRecord) -> StoreResult<ThoughtRecord> {
        // Fail fast: nothing touches disk before the record checks out
        record.validate()?;

        let _guard = self.lock()?;
        let mut dataset = self.load_current()?;

        if dataset.contains_number(record.number) {
            return Err(StoreError::DuplicateNumber {
                number: record.number,
            });
        }

        let mut stored = record;
        stored.timestamp = Utc::now();
        dataset.insert(stored.clone());

        self.persist(&dataset)?;

        debug!(
            number = stored.number,
            stage = %stored.stage,
            total = dataset.thoughts.len(),
            "Thought appended"
        );

        Ok(stored)
    }

    /// Point-in-time snapshot of all records, ordered by number
    pub fn list(&self) -> StoreResult<Vec<ThoughtRecord>> {
        Ok(self.snapshot()?.sorted_thoughts())
    }

    /// Point-in-time snapshot of the full dataset
    pub fn snapshot(&self) -> StoreResult<Dataset> {
        self.load_current()
    }

    /// Remove all records and persist an empty dataset.
    ///
    /// Idempotent; clearing an already-empty (or even corrupt) dataset
    /// succeeds. The session id is preserved when the current file is
    /// readable, otherwise a fresh one is minted.
    pub fn clear(&self) -> StoreResult<()> {
        let _guard = self.lock()?;

        let mut empty = Dataset::new();
        if let Ok(current) = self.load_current() {
            empty.session_id = current.session_id;
        }

        self.persist(&empty)?;
        info!("Thought history cleared");
        Ok(())
    }

    /// Serialize the full dataset to an external file in the persisted format
    pub fn export_to(&self, path: &Path) -> StoreResult<()> {
        let dataset = self.snapshot()?;
        let bytes = serde_json::to_vec_pretty(&dataset)?;
        write_atomic(path, &bytes)?;
        info!(path = %path.display(), thoughts = dataset.thoughts.len(), "Session exported");
        Ok(())
    }

    /// Replace the dataset with the contents of an external file.
    ///
    /// The source must parse and pass full integrity checks before anything
    /// is replaced; a malformed file leaves the existing dataset untouched
    /// and signals [`StoreError::Import`].
    pub fn import_from(&self, path: &Path) -> StoreResult<Dataset> {
        let import_err = |message: String| StoreError::Import {
            path: path.to_path_buf(),
            message,
        };

        let raw = fs::read_to_string(path).map_err(|e| import_err(e.to_string()))?;
        let dataset: Dataset =
            serde_json::from_str(&raw).map_err(|e| import_err(e.to_string()))?;
        dataset.check_integrity().map_err(import_err)?;

        let _guard = self.lock()?;
        self.persist(&dataset)?;

        info!(path = %path.display(), thoughts = dataset.thoughts.len(), "Session imported");
        Ok(dataset)
    }

    fn lock(&self) -> StoreResult<LockGuard> {
        LockGuard::acquire(&self.lock_path, self.lock_timeout)
    }

    /// Load the current dataset, applying backup recovery when the live
    /// file exists but does not parse or fails integrity checks.
    fn load_current(&self) -> StoreResult<Dataset> {
        let raw = match fs::read_to_string(&self.dataset_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Dataset::new()),
            Err(e) => return Err(e.into()),
        };

        match parse_dataset(&raw) {
            Ok(dataset) => Ok(dataset),
            Err(reason) => {
                warn!(
                    path = %self.dataset_path.display(),
                    reason = %reason,
                    "Live dataset unreadable, attempting backup recovery"
                );
                self.recover_from_backups()
            }
        }
    }

    /// Try backups newest to oldest; the first that parses wins.
    fn recover_from_backups(&self) -> StoreResult<Dataset> {
        for slot in 1..=self.backup_count {
            let path = self.backup_path(slot);
            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(_) => continue,
            };
            match parse_dataset(&raw) {
                Ok(dataset) => {
                    warn!(
                        backup = %path.display(),
                        thoughts = dataset.thoughts.len(),
                        "Recovered dataset from backup"
                    );
                    return Ok(dataset);
                }
                Err(reason) => {
                    warn!(backup = %path.display(), reason = %reason, "Backup unusable");
                }
            }
        }

        match self.recovery {
            RecoveryPolicy::StartEmpty => {
                warn!(
                    path = %self.dataset_path.display(),
                    "No recoverable backup; starting with an empty dataset"
                );
                Ok(Dataset::new())
            }
            RecoveryPolicy::Strict => Err(StoreError::CorruptDataset {
                path: self.dataset_path.clone(),
            }),
        }
    }

    /// Persist the dataset: temp file, backup rotation, atomic rename.
    ///
    /// Ordering matters: the new document is fully on disk (and synced)
    /// before the rotation touches any backup, and the live file is only
    /// replaced by rename. A crash at any step leaves a loadable state.
    fn persist(&self, dataset: &Dataset) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(dataset)?;

        let tmp_path = lockfile::temp_path(&self.dataset_path);
        {
            use std::io::Write;
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }

        self.rotate_backups()?;

        fs::rename(&tmp_path, &self.dataset_path)?;
        Ok(())
    }

    /// Shift `.bak.N` slots, dropping the oldest beyond the bound, then
    /// copy the current live file into `.bak.1`.
    fn rotate_backups(&self) -> StoreResult<()> {
        if !self.dataset_path.exists() {
            return Ok(());
        }

        let oldest = self.backup_path(self.backup_count);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for slot in (1..self.backup_count).rev() {
            let from = self.backup_path(slot);
            if from.exists() {
                fs::rename(&from, self.backup_path(slot + 1))?;
            }
        }
        fs::copy(&self.dataset_path, self.backup_path(1))?;
        Ok(())
    }

    /// Backup slot path (`session.json.bak.1` is the most recent).
    fn backup_path(&self, slot: usize) -> PathBuf {
        let mut os = self.dataset_path.as_os_str().to_os_string();
        os.push(format!(".bak.{}", slot));
        os.into()
    }
}

/// Parse and integrity-check a dataset document.
fn parse_dataset(raw: &str) -> Result<Dataset, String> {
    let dataset: Dataset = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    dataset.check_integrity()?;
    Ok(dataset)
}
