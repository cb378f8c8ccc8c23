use super::get_or_create::{Lookup, get_or_create};
use crate::core::{AggregateRecord, HistoryError, InvocationContext, RecordKey, Result, UpstreamAttribute};
use crate::storage::RecordStore;
use crate::upstream::UpstreamValueSource;
use tracing::{Level, event, info_span};

/// Hands out the single history record of a token, creating it from
/// upstream state the first time it is asked for.
pub struct HistoryAccessor<S, U> {
    store: S,
    upstream: U,
}

impl<S, U> HistoryAccessor<S, U>
where
    S: RecordStore,
    U: UpstreamValueSource,
{
    pub fn new(store: S, upstream: U) -> Self {
        Self { store, upstream }
    }

    /// Return the record stored under `key`, creating it on first access.
    ///
    /// An existing record is returned as stored: upstream is not consulted
    /// and the name/symbol/supply snapshot is never refreshed. On a miss the
    /// three upstream values are read, a record with zeroed counters is
    /// persisted and returned. If a read fails the call fails with
    /// [`HistoryError::UpstreamUnavailable`] and nothing is written.
    ///
    /// `context` is accepted for callers that have a transaction or block at
    /// hand. It is only attached to the tracing span; upstream reads are
    /// always made against current state.
    pub fn get_or_create_aggregate_record(
        &self,
        key: &RecordKey,
        context: &InvocationContext,
    ) -> Result<AggregateRecord> {
        self.lookup(key, context).map(Lookup::into_record)
    }

    /// Like [`get_or_create_aggregate_record`](Self::get_or_create_aggregate_record)
    /// but reports whether this call created the record.
    pub fn lookup(&self, key: &RecordKey, context: &InvocationContext) -> Result<Lookup> {
        let span = info_span!(
            "history.get_or_create",
            key = %key,
            block = ?context.block,
            tx = ?context.transaction.as_ref().map(|tx| tx.hash.as_str())
        );
        let _enter = span.enter();

        match get_or_create(&self.store, key, |key| self.snapshot_upstream(key)) {
            Ok(lookup) => {
                if lookup.was_created() {
                    let record = lookup.record();
                    event!(
                        Level::INFO,
                        token_name = %record.name,
                        token_symbol = %record.symbol,
                        total_supply = %record.total_supply,
                        "history record created"
                    );
                } else {
                    event!(Level::DEBUG, "history record found");
                }
                Ok(lookup)
            }
            Err(err) => {
                event!(Level::ERROR, error = %err, "history get-or-create failed");
                Err(err)
            }
        }
    }

    /// Apply `mutate` to the record under `key` and persist the result.
    ///
    /// This is the entry point for event handlers that maintain the
    /// counters. The record is created first if needed. Callers must not
    /// touch the snapshot fields.
    pub fn update<F>(&self, key: &RecordKey, context: &InvocationContext, mutate: F) -> Result<AggregateRecord>
    where
        F: FnOnce(&mut AggregateRecord),
    {
        let mut record = self.get_or_create_aggregate_record(key, context)?;
        mutate(&mut record);
        if let Err(err) = self.store.save(&record) {
            event!(Level::ERROR, key = %key, error = %err, "history update persist failed");
            return Err(err);
        }
        event!(Level::DEBUG, key = %key, "history record updated");
        Ok(record)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    pub fn into_parts(self) -> (S, U) {
        (self.store, self.upstream)
    }

    fn snapshot_upstream(&self, key: &RecordKey) -> Result<AggregateRecord> {
        let total_supply = self
            .upstream
            .current_total_supply()
            .map_err(|e| HistoryError::upstream(UpstreamAttribute::TotalSupply, e))?;
        let name = self
            .upstream
            .current_name()
            .map_err(|e| HistoryError::upstream(UpstreamAttribute::Name, e))?;
        let symbol = self
            .upstream
            .current_symbol()
            .map_err(|e| HistoryError::upstream(UpstreamAttribute::Symbol, e))?;

        Ok(AggregateRecord::new(*key, name, symbol, total_supply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::KEY_LENGTH;
    use crate::storage::InMemoryRecordStore;
    use crate::upstream::FixedUpstream;
    use num_bigint::BigInt;

    #[test]
    fn test_update_creates_then_counts() {
        let accessor = HistoryAccessor::new(InMemoryRecordStore::new(), FixedUpstream::new(10u8, "Token", "TKN"));
        let key = RecordKey::new([3; KEY_LENGTH]);
        let ctx = InvocationContext::none().with_block(12);

        accessor.update(&key, &ctx, |r| r.record_transfer()).unwrap();
        let record = accessor
            .update(&key, &ctx, |r| {
                r.record_transfer();
                r.holder_gained();
                r.address_discovered();
            })
            .unwrap();

        assert_eq!(record.transfer_count, BigInt::from(2));
        assert_eq!(record.holder_count, BigInt::from(1));
        assert_eq!(record.address_count, BigInt::from(1));
        assert_eq!(accessor.store().load(&key).unwrap(), Some(record));
    }

    #[test]
    fn test_context_does_not_change_result() {
        let accessor = HistoryAccessor::new(InMemoryRecordStore::new(), FixedUpstream::new(10u8, "Token", "TKN"));
        let key = RecordKey::new([4; KEY_LENGTH]);
        let plain = accessor.get_or_create_aggregate_record(&key, &InvocationContext::none()).unwrap();
        let with_ctx = accessor
            .get_or_create_aggregate_record(&key, &InvocationContext::none().with_transaction("0xabc").with_block(99))
            .unwrap();
        assert_eq!(plain, with_ctx);
    }
}
