use super::persistence::{DurabilityMode, PersistenceManager, WalEntry};
use super::{InMemoryRecordStore, RecordStore};
use crate::core::{AggregateRecord, RecordKey, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Record store backed by a write-ahead log and periodic snapshots.
///
/// Every write is appended to the WAL before it becomes visible to `load`,
/// so a failed append leaves the previous state in place.
pub struct FileRecordStore {
    records: InMemoryRecordStore,
    persistence: Mutex<PersistenceManager>,
    data_dir: PathBuf,
}

impl FileRecordStore {
    /// Open (or create) a store in `data_dir`, replaying any prior state.
    pub fn open<P: AsRef<Path>>(data_dir: P, durability_mode: DurabilityMode) -> Result<Self> {
        Self::open_with_threshold(data_dir, durability_mode, 1000)
    }

    pub fn open_with_threshold<P: AsRef<Path>>(
        data_dir: P,
        durability_mode: DurabilityMode,
        checkpoint_threshold: usize,
    ) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let mut persistence = PersistenceManager::new(&data_dir, durability_mode)?;
        persistence.wal_mut().set_checkpoint_threshold(checkpoint_threshold);

        let recovered = persistence.recover()?;
        if !recovered.is_empty() {
            info!("recovered {} history records from '{}'", recovered.len(), data_dir.display());
        }

        let store = Self {
            records: InMemoryRecordStore::with_records(recovered),
            persistence: Mutex::new(persistence),
            data_dir,
        };
        // A replayed WAL may already be at the threshold.
        store.checkpoint_if_needed();
        Ok(store)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn durability_mode(&self) -> Result<DurabilityMode> {
        Ok(self.persistence.lock()?.durability_mode())
    }

    /// Write a snapshot of every record and truncate the WAL.
    pub fn checkpoint(&self) -> Result<()> {
        // Lock order matches writers: records, then persistence.
        self.records.read_all_with(|records| {
            let mut persistence = self.persistence.lock()?;
            persistence.checkpoint(records)
        })
    }

    fn log_save(&self, record: &AggregateRecord) -> Result<()> {
        let mut persistence = self.persistence.lock()?;
        persistence.log(&WalEntry::Save { record: record.clone() })
    }

    fn checkpoint_if_needed(&self) {
        let needed = match self.persistence.lock() {
            Ok(persistence) => persistence.needs_checkpoint(),
            Err(_) => false,
        };
        if needed {
            // The write itself is already durable in the WAL.
            if let Err(err) = self.checkpoint() {
                warn!("checkpoint of '{}' failed: {}", self.data_dir.display(), err);
            }
        }
    }
}

impl RecordStore for FileRecordStore {
    fn load(&self, key: &RecordKey) -> Result<Option<AggregateRecord>> {
        self.records.load(key)
    }

    fn save(&self, record: &AggregateRecord) -> Result<()> {
        self.records.save_with(record, |r| self.log_save(r))?;
        self.checkpoint_if_needed();
        Ok(())
    }

    fn insert_if_absent(&self, record: AggregateRecord) -> Result<(AggregateRecord, bool)> {
        let (stored, inserted) = self.records.insert_if_absent_with(record, |r| self.log_save(r))?;
        if inserted {
            self.checkpoint_if_needed();
        }
        Ok((stored, inserted))
    }

    fn contains(&self, key: &RecordKey) -> Result<bool> {
        self.records.contains(key)
    }

    fn len(&self) -> Result<usize> {
        self.records.len()
    }
}
