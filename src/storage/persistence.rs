//! Write-Ahead Logging (WAL) and snapshots for durable record stores

use crate::core::{AggregateRecord, HistoryError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;

pub const WAL_FILE_NAME: &str = "history.wal";
pub const SNAPSHOT_FILE_NAME: &str = "history.snapshot";
const SNAPSHOT_VERSION: u32 = 1;

fn persistence_err(context: &str, err: impl std::fmt::Display) -> HistoryError {
    HistoryError::PersistenceFailure(format!("{}: {}", context, err))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ============================================================================
// WAL Entry Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalEntry {
    Save { record: AggregateRecord },
}

// ============================================================================
// Record Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub version: u32,
    pub records: Vec<AggregateRecord>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: u64,
    pub record_count: usize,
}

impl RecordSnapshot {
    pub fn new(records: Vec<AggregateRecord>) -> Self {
        let record_count = records.len();
        Self {
            version: SNAPSHOT_VERSION,
            records,
            metadata: SnapshotMetadata { created_at: now_millis(), record_count },
        }
    }
}

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync after every WAL append
    Sync,
    /// flush to the OS, no fsync
    #[default]
    Async,
    /// nothing is written to disk
    None,
}

impl std::str::FromStr for DurabilityMode {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sync" => Ok(Self::Sync),
            "async" => Ok(Self::Async),
            "none" => Ok(Self::None),
            other => Err(HistoryError::ConfigError(format!("unknown durability mode '{}'", other))),
        }
    }
}

// ============================================================================
// WAL Manager
// ============================================================================

pub struct WalManager {
    wal_path: PathBuf,
    wal_file: Option<File>,
    durability_mode: DurabilityMode,
    entries_since_checkpoint: usize,
    checkpoint_threshold: usize,
}

impl WalManager {
    pub fn new<P: AsRef<Path>>(wal_path: P, durability_mode: DurabilityMode) -> Result<Self> {
        let wal_path = wal_path.as_ref().to_path_buf();

        let wal_file = if durability_mode != DurabilityMode::None {
            if let Some(parent) = wal_path.parent() {
                fs::create_dir_all(parent).map_err(|e| persistence_err("Failed to create WAL directory", e))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&wal_path)
                .map_err(|e| persistence_err("Failed to open WAL file", e))?;
            Some(file)
        } else {
            None
        };

        Ok(Self {
            wal_path,
            wal_file,
            durability_mode,
            entries_since_checkpoint: 0,
            checkpoint_threshold: 1000,
        })
    }

    /// Append one entry. On error the WAL is cut back to its previous length,
    /// so a failed append never reappears on recovery.
    pub fn append(&mut self, entry: &WalEntry) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        let serialized = rmp_serde::to_vec(entry).map_err(|e| persistence_err("Failed to serialize WAL entry", e))?;
        let len = serialized.len() as u32;
        let mut frame = Vec::with_capacity(4 + serialized.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&serialized);

        let sync = self.durability_mode == DurabilityMode::Sync;
        let file = self
            .wal_file
            .as_mut()
            .ok_or_else(|| HistoryError::PersistenceFailure("WAL file not initialized".to_string()))?;
        let committed_len = file
            .metadata()
            .map_err(|e| persistence_err("Failed to stat WAL", e))?
            .len();

        let written = file
            .write_all(&frame)
            .map_err(|e| persistence_err("Failed to write WAL", e))
            .and_then(|()| {
                if sync {
                    file.sync_all().map_err(|e| persistence_err("Failed to sync WAL", e))
                } else {
                    Ok(())
                }
            });

        if let Err(err) = written {
            if let Err(rollback) = file.set_len(committed_len) {
                warn!(
                    "could not roll back failed append in '{}' to {} bytes: {}",
                    self.wal_path.display(),
                    committed_len,
                    rollback
                );
            }
            return Err(err);
        }

        self.entries_since_checkpoint += 1;
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<WalEntry>> {
        Ok(self.scan()?.0)
    }

    /// Read every complete entry; also returns the offset of a torn tail.
    fn scan(&self) -> Result<(Vec<WalEntry>, Option<u64>)> {
        if !self.wal_path.exists() {
            return Ok((Vec::new(), None));
        }
        let file = File::open(&self.wal_path).map_err(|e| persistence_err("Failed to open WAL for reading", e))?;
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut offset = 0u64;
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    let torn = reader.get_ref().metadata().map(|m| m.len() > offset).unwrap_or(false);
                    return Ok((entries, torn.then_some(offset)));
                }
                Err(e) => return Err(persistence_err("Failed to read WAL entry length", e)),
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut data = vec![0u8; len];
            match reader.read_exact(&mut data) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    warn!(
                        "dropping torn WAL entry at tail of '{}' ({} bytes declared)",
                        self.wal_path.display(),
                        len
                    );
                    return Ok((entries, Some(offset)));
                }
                Err(e) => return Err(persistence_err("Failed to read WAL entry data", e)),
            }
            let entry: WalEntry =
                rmp_serde::from_slice(&data).map_err(|e| persistence_err("Failed to deserialize WAL entry", e))?;
            entries.push(entry);
            offset += 4 + len as u64;
        }
    }

    /// Cut a torn tail off the WAL so new appends follow the last complete entry.
    pub fn truncate_torn_tail(&mut self) -> Result<bool> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(false);
        }
        let Some(offset) = self.scan()?.1 else {
            return Ok(false);
        };
        let file = self
            .wal_file
            .as_mut()
            .ok_or_else(|| HistoryError::PersistenceFailure("WAL file not initialized".to_string()))?;
        file.set_len(offset).map_err(|e| persistence_err("Failed to truncate torn WAL tail", e))?;
        file.sync_all().map_err(|e| persistence_err("Failed to sync WAL", e))?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        let file = self
            .wal_file
            .as_mut()
            .ok_or_else(|| HistoryError::PersistenceFailure("WAL file not initialized".to_string()))?;
        file.set_len(0).map_err(|e| persistence_err("Failed to truncate WAL", e))?;
        if self.durability_mode == DurabilityMode::Sync {
            file.sync_all().map_err(|e| persistence_err("Failed to sync WAL", e))?;
        }
        self.entries_since_checkpoint = 0;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn replace_file(&mut self, file: File) -> Option<File> {
        self.wal_file.replace(file)
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.entries_since_checkpoint >= self.checkpoint_threshold
    }

    pub fn entries_since_checkpoint(&self) -> usize {
        self.entries_since_checkpoint
    }

    pub fn set_checkpoint_threshold(&mut self, threshold: usize) {
        self.checkpoint_threshold = threshold.max(1);
    }

    pub fn path(&self) -> &Path {
        &self.wal_path
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    /// Write the snapshot to a temp file in the same directory, then rename.
    pub fn save(&self, snapshot: &RecordSnapshot) -> Result<()> {
        let dir = match self.snapshot_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| persistence_err("Failed to create snapshot directory", e))?;

        let serialized = rmp_serde::to_vec(snapshot).map_err(|e| persistence_err("Failed to serialize snapshot", e))?;
        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| persistence_err("Failed to create temp file", e))?;
        temp.write_all(&serialized).map_err(|e| persistence_err("Failed to write snapshot", e))?;
        temp.as_file().sync_all().map_err(|e| persistence_err("Failed to sync snapshot", e))?;
        temp.persist(&self.snapshot_path)
            .map_err(|e| persistence_err("Failed to rename snapshot", e.error))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<RecordSnapshot>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&self.snapshot_path).map_err(|e| persistence_err("Failed to open snapshot", e))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(|e| persistence_err("Failed to read snapshot", e))?;
        let snapshot: RecordSnapshot =
            rmp_serde::from_slice(&data).map_err(|e| persistence_err("Failed to deserialize snapshot", e))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(HistoryError::PersistenceFailure(format!(
                "Unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(Some(snapshot))
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }
}

// ============================================================================
// Persistence Manager
// ============================================================================

pub struct PersistenceManager {
    wal: WalManager,
    snapshot: SnapshotManager,
    durability_mode: DurabilityMode,
}

impl PersistenceManager {
    pub fn new<P: AsRef<Path>>(data_dir: P, durability_mode: DurabilityMode) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let wal = WalManager::new(data_dir.join(WAL_FILE_NAME), durability_mode)?;
        let snapshot = SnapshotManager::new(data_dir.join(SNAPSHOT_FILE_NAME));
        Ok(Self { wal, snapshot, durability_mode })
    }

    pub fn log(&mut self, entry: &WalEntry) -> Result<()> {
        self.wal.append(entry)
    }

    pub fn checkpoint(&mut self, records: Vec<AggregateRecord>) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        let snapshot = RecordSnapshot::new(records);
        debug!("checkpointing {} records", snapshot.metadata.record_count);
        self.snapshot.save(&snapshot)?;
        self.wal.clear()?;
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.wal.needs_checkpoint()
    }

    /// Rebuild the record set from the snapshot plus the WAL tail.
    ///
    /// Later WAL entries win over earlier ones and over the snapshot. A torn
    /// WAL tail is dropped and cut from the file.
    pub fn recover(&mut self) -> Result<Vec<AggregateRecord>> {
        let mut records: std::collections::HashMap<_, _> = match self.snapshot.load()? {
            Some(snapshot) => snapshot.records.into_iter().map(|r| (r.key, r)).collect(),
            None => std::collections::HashMap::new(),
        };

        let (entries, torn_at) = self.wal.scan()?;
        if torn_at.is_some() {
            self.wal.truncate_torn_tail()?;
        }
        // Replayed entries count toward the next checkpoint.
        self.wal.entries_since_checkpoint = entries.len();

        for entry in entries {
            match entry {
                WalEntry::Save { record } => {
                    records.insert(record.key, record);
                }
            }
        }

        Ok(records.into_values().collect())
    }

    pub fn wal(&self) -> &WalManager {
        &self.wal
    }

    pub fn wal_mut(&mut self) -> &mut WalManager {
        &mut self.wal
    }

    pub fn snapshot(&self) -> &SnapshotManager {
        &self.snapshot
    }

    pub fn durability_mode(&self) -> DurabilityMode {
        self.durability_mode
    }
}
