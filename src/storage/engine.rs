use crate::core::{AggregateRecord, RecordKey, Result};

/// Record store trait - allows pluggable storage backends
pub trait RecordStore: Send + Sync {
    /// Load the record stored under `key`, if any
    fn load(&self, key: &RecordKey) -> Result<Option<AggregateRecord>>;

    /// Store `record` under its key, replacing any previous version
    fn save(&self, record: &AggregateRecord) -> Result<()>;

    /// Store `record` only if its key is vacant and return whichever record
    /// the store holds afterwards, plus `true` when this call inserted it.
    ///
    /// The default is a plain load-then-save and is only safe when calls are
    /// serialized. Stores shared between threads override it atomically.
    fn insert_if_absent(&self, record: AggregateRecord) -> Result<(AggregateRecord, bool)> {
        if let Some(existing) = self.load(&record.key)? {
            return Ok((existing, false));
        }
        self.save(&record)?;
        Ok((record, true))
    }

    /// Check if a record exists
    fn contains(&self, key: &RecordKey) -> Result<bool> {
        Ok(self.load(key)?.is_some())
    }

    /// Number of stored records
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn load(&self, key: &RecordKey) -> Result<Option<AggregateRecord>> {
        (**self).load(key)
    }

    fn save(&self, record: &AggregateRecord) -> Result<()> {
        (**self).save(record)
    }

    fn insert_if_absent(&self, record: AggregateRecord) -> Result<(AggregateRecord, bool)> {
        (**self).insert_if_absent(record)
    }

    fn contains(&self, key: &RecordKey) -> Result<bool> {
        (**self).contains(key)
    }

    fn len(&self) -> Result<usize> {
        (**self).len()
    }
}

impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    fn load(&self, key: &RecordKey) -> Result<Option<AggregateRecord>> {
        (**self).load(key)
    }

    fn save(&self, record: &AggregateRecord) -> Result<()> {
        (**self).save(record)
    }

    fn insert_if_absent(&self, record: AggregateRecord) -> Result<(AggregateRecord, bool)> {
        (**self).insert_if_absent(record)
    }

    fn contains(&self, key: &RecordKey) -> Result<bool> {
        (**self).contains(key)
    }

    fn len(&self) -> Result<usize> {
        (**self).len()
    }
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn load(&self, key: &RecordKey) -> Result<Option<AggregateRecord>> {
        (**self).load(key)
    }

    fn save(&self, record: &AggregateRecord) -> Result<()> {
        (**self).save(record)
    }

    fn insert_if_absent(&self, record: AggregateRecord) -> Result<(AggregateRecord, bool)> {
        (**self).insert_if_absent(record)
    }

    fn contains(&self, key: &RecordKey) -> Result<bool> {
        (**self).contains(key)
    }

    fn len(&self) -> Result<usize> {
        (**self).len()
    }
}
