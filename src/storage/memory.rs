use super::RecordStore;
use crate::core::{AggregateRecord, RecordKey, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Volatile record store; records live as long as the value.
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<RecordKey, AggregateRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a store with existing records
    pub fn with_records(records: impl IntoIterator<Item = AggregateRecord>) -> Self {
        let records = records.into_iter().map(|r| (r.key, r)).collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Copy of every stored record (for snapshots)
    pub fn all_records(&self) -> Result<Vec<AggregateRecord>> {
        let records = self.records.read()?;
        Ok(records.values().cloned().collect())
    }

    /// Run `f` over a copy of every record while holding the read lock, so no
    /// writer can commit until it returns.
    pub(crate) fn read_all_with<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(Vec<AggregateRecord>) -> Result<R>,
    {
        let guard = self.records.read()?;
        f(guard.values().cloned().collect())
    }

    /// Replace the contents with `records` (for recovery)
    pub fn restore(&self, records: Vec<AggregateRecord>) -> Result<()> {
        let mut guard = self.records.write()?;
        guard.clear();
        guard.extend(records.into_iter().map(|r| (r.key, r)));
        Ok(())
    }

    /// Insert under the write lock after `commit` accepts the record.
    ///
    /// `commit` runs only when the key is vacant; if it fails nothing is
    /// inserted. Durable stores use it to log before publishing.
    pub(crate) fn insert_if_absent_with<F>(&self, record: AggregateRecord, commit: F) -> Result<(AggregateRecord, bool)>
    where
        F: FnOnce(&AggregateRecord) -> Result<()>,
    {
        let mut guard = self.records.write()?;
        if let Some(existing) = guard.get(&record.key) {
            return Ok((existing.clone(), false));
        }
        commit(&record)?;
        guard.insert(record.key, record.clone());
        Ok((record, true))
    }

    pub(crate) fn save_with<F>(&self, record: &AggregateRecord, commit: F) -> Result<()>
    where
        F: FnOnce(&AggregateRecord) -> Result<()>,
    {
        let mut guard = self.records.write()?;
        commit(record)?;
        guard.insert(record.key, record.clone());
        Ok(())
    }
}

impl RecordStore for InMemoryRecordStore {
    fn load(&self, key: &RecordKey) -> Result<Option<AggregateRecord>> {
        let records = self.records.read()?;
        Ok(records.get(key).cloned())
    }

    fn save(&self, record: &AggregateRecord) -> Result<()> {
        self.save_with(record, |_| Ok(()))
    }

    fn insert_if_absent(&self, record: AggregateRecord) -> Result<(AggregateRecord, bool)> {
        self.insert_if_absent_with(record, |_| Ok(()))
    }

    fn contains(&self, key: &RecordKey) -> Result<bool> {
        Ok(self.records.read()?.contains_key(key))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.records.read()?.len())
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{HistoryError, KEY_LENGTH};
    use num_bigint::BigInt;

    fn record(seed: u8, supply: i64) -> AggregateRecord {
        AggregateRecord::new(
            RecordKey::new([seed; KEY_LENGTH]),
            "Token".to_string(),
            "TKN".to_string(),
            BigInt::from(supply),
        )
    }

    #[test]
    fn test_load_missing_is_none() {
        let store = InMemoryRecordStore::new();
        assert!(store.load(&RecordKey::new([0; KEY_LENGTH])).unwrap().is_none());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_save_then_load() {
        let store = InMemoryRecordStore::new();
        let rec = record(1, 100);
        store.save(&rec).unwrap();
        assert_eq!(store.load(&rec.key).unwrap(), Some(rec.clone()));
        assert!(store.contains(&rec.key).unwrap());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_insert_if_absent_keeps_first() {
        let store = InMemoryRecordStore::new();
        let (first, inserted) = store.insert_if_absent(record(2, 100)).unwrap();
        assert!(inserted);
        let (second, inserted) = store.insert_if_absent(record(2, 999)).unwrap();
        assert!(!inserted);
        assert_eq!(first.total_supply, BigInt::from(100));
        assert_eq!(second.total_supply, BigInt::from(100));

        // An identical record for an occupied key still counts as a hit.
        let (_, inserted) = store.insert_if_absent(record(2, 100)).unwrap();
        assert!(!inserted);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_failed_commit_leaves_store_untouched() {
        let store = InMemoryRecordStore::new();
        let rec = record(3, 1);
        let err = store
            .insert_if_absent_with(rec.clone(), |_| {
                Err(HistoryError::PersistenceFailure("disk full".to_string()))
            })
            .unwrap_err();
        assert!(err.is_persistence_failure());
        assert!(store.load(&rec.key).unwrap().is_none());
    }

    #[test]
    fn test_restore_replaces_contents() {
        let store = InMemoryRecordStore::with_records(vec![record(4, 1)]);
        store.restore(vec![record(5, 2), record(6, 3)]).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        assert!(!store.contains(&RecordKey::new([4; KEY_LENGTH])).unwrap());
    }
}
