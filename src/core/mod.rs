pub mod error;
pub mod types;

pub use error::{HistoryError, Result, UpstreamAttribute, UpstreamError};
pub use types::{AggregateRecord, InvocationContext, KEY_LENGTH, RecordKey, TransactionRef};
