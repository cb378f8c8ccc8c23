use crate::core::{AggregateRecord, RecordKey, Result};
use crate::storage::RecordStore;

/// Outcome of a get-or-create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The record was already stored.
    Existing(AggregateRecord),
    /// This call built and stored the record.
    Created(AggregateRecord),
}

impl Lookup {
    pub fn record(&self) -> &AggregateRecord {
        match self {
            Self::Existing(record) | Self::Created(record) => record,
        }
    }

    pub fn into_record(self) -> AggregateRecord {
        match self {
            Self::Existing(record) | Self::Created(record) => record,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Return the record under `key`, building it with `factory` when absent.
///
/// `factory` runs only on a miss; if it fails nothing is written. The new
/// record is committed with [`RecordStore::insert_if_absent`], so when two
/// callers race on the same key the first commit wins and both observe it.
pub fn get_or_create<S, F>(store: &S, key: &RecordKey, factory: F) -> Result<Lookup>
where
    S: RecordStore + ?Sized,
    F: FnOnce(&RecordKey) -> Result<AggregateRecord>,
{
    if let Some(existing) = store.load(key)? {
        return Ok(Lookup::Existing(existing));
    }

    let candidate = factory(key)?;
    debug_assert_eq!(&candidate.key, key, "factory must build the requested key");

    match store.insert_if_absent(candidate)? {
        (stored, true) => Ok(Lookup::Created(stored)),
        (stored, false) => Ok(Lookup::Existing(stored)),
    }
}
