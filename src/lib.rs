// ============================================================================
// Token History Library
// ============================================================================

pub mod config;
pub mod core;
pub mod history;
pub mod storage;
pub mod upstream;

// Re-export main types for convenience
pub use crate::config::HistoryConfig;
pub use crate::core::{
    AggregateRecord, HistoryError, InvocationContext, RecordKey, Result, TransactionRef, UpstreamAttribute,
    UpstreamError,
};
pub use crate::history::{HistoryAccessor, Lookup, get_or_create};
pub use crate::storage::{DurabilityMode, FileRecordStore, InMemoryRecordStore, RecordStore};
pub use crate::upstream::{FixedUpstream, UpstreamValueSource};

// ============================================================================
// Deployment handle
// ============================================================================

/// History of one configured token.
///
/// Binds an accessor to the token address from [`HistoryConfig`], so
/// callers never pass the record key themselves.
///
/// # Examples
///
/// ```
/// use token_history::{FixedUpstream, HistoryConfig, InvocationContext, TokenHistory};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = HistoryConfig::from_url("history://0x6b175474e89094c44da98b954eedeac495271d0f")?;
/// let history = TokenHistory::open(config, FixedUpstream::new(1_000_000u64, "Token", "TKN"))?;
///
/// let record = history.history(&InvocationContext::none())?;
/// assert_eq!(record.symbol, "TKN");
/// # Ok(())
/// # }
/// ```
pub struct TokenHistory<U> {
    config: HistoryConfig,
    accessor: HistoryAccessor<Box<dyn RecordStore>, U>,
}

impl<U: UpstreamValueSource> TokenHistory<U> {
    /// Open the configured store and bind it to `upstream`
    pub fn open(config: HistoryConfig, upstream: U) -> Result<Self> {
        let store = config.open_store()?;
        Ok(Self {
            config,
            accessor: HistoryAccessor::new(store, upstream),
        })
    }

    /// The token's history record, created on first call
    pub fn history(&self, context: &InvocationContext) -> Result<AggregateRecord> {
        self.accessor.get_or_create_aggregate_record(&self.config.token, context)
    }

    /// Mutate the token's counters and persist them
    pub fn update<F>(&self, context: &InvocationContext, mutate: F) -> Result<AggregateRecord>
    where
        F: FnOnce(&mut AggregateRecord),
    {
        self.accessor.update(&self.config.token, context, mutate)
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn accessor(&self) -> &HistoryAccessor<Box<dyn RecordStore>, U> {
        &self.accessor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use tempfile::TempDir;

    const TOKEN: &str = "0x6b175474e89094c44da98b954eedeac495271d0f";

    #[test]
    fn test_token_history_in_memory() {
        let config = HistoryConfig::new(TOKEN.parse().unwrap());
        let history = TokenHistory::open(config, FixedUpstream::new(42u8, "Token", "TKN")).unwrap();

        let record = history.history(&InvocationContext::none()).unwrap();
        assert_eq!(record.key.to_string(), TOKEN);
        assert_eq!(record.total_supply, BigInt::from(42));
    }

    #[test]
    fn test_token_history_durable_update() {
        let temp_dir = TempDir::new().unwrap();
        let config = HistoryConfig::new(TOKEN.parse().unwrap())
            .data_dir(temp_dir.path())
            .durability(DurabilityMode::Sync);

        {
            let history = TokenHistory::open(config.clone(), FixedUpstream::new(42u8, "Token", "TKN")).unwrap();
            history.update(&InvocationContext::none(), |r| r.record_transfer()).unwrap();
        }

        let history = TokenHistory::open(config, FixedUpstream::new(7u8, "Other", "OTH")).unwrap();
        let record = history.history(&InvocationContext::none()).unwrap();
        assert_eq!(record.name, "Token");
        assert_eq!(record.transfer_count, BigInt::from(1));
    }
}
