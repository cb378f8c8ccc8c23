use std::fmt;

use thiserror::Error;

/// The upstream attribute a read was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamAttribute {
    TotalSupply,
    Name,
    Symbol,
}

impl fmt::Display for UpstreamAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TotalSupply => "totalSupply",
            Self::Name => "name",
            Self::Symbol => "symbol",
        };
        f.write_str(name)
    }
}

/// Failure reported by an upstream value source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("ledger unreachable: {0}")]
    Unreachable(String),

    #[error("contract not deployed at {0}")]
    NotDeployed(String),

    #[error("call reverted: {0}")]
    CallReverted(String),
}

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Upstream {attribute} unavailable: {source}")]
    UpstreamUnavailable {
        attribute: UpstreamAttribute,
        #[source]
        source: UpstreamError,
    },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Invalid record key: {0}")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl HistoryError {
    pub fn upstream(attribute: UpstreamAttribute, source: UpstreamError) -> Self {
        Self::UpstreamUnavailable { attribute, source }
    }

    pub fn is_upstream_unavailable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }

    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, Self::PersistenceFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, HistoryError>;

impl<T> From<std::sync::PoisonError<T>> for HistoryError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_message_names_attribute() {
        let err = HistoryError::upstream(
            UpstreamAttribute::Name,
            UpstreamError::Unreachable("connection refused".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Upstream name unavailable: ledger unreachable: connection refused"
        );
        assert!(err.is_upstream_unavailable());
        assert!(!err.is_persistence_failure());
    }

    #[test]
    fn test_poison_maps_to_lock_error() {
        let lock = std::sync::Mutex::new(0);
        let _ = std::panic::catch_unwind(|| {
            let _guard = lock.lock().unwrap();
            panic!("poison");
        });
        let err: HistoryError = lock.lock().unwrap_err().into();
        assert!(matches!(err, HistoryError::LockError(_)));
    }
}
