//! Read-only access to the authoritative token state.

use crate::core::UpstreamError;
use num_bigint::BigInt;
use std::sync::Arc;

pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

/// Source of the token values snapshotted into a new record.
///
/// Each read may fail on its own; reads are independent of each other.
pub trait UpstreamValueSource: Send + Sync {
    fn current_total_supply(&self) -> UpstreamResult<BigInt>;

    fn current_name(&self) -> UpstreamResult<String>;

    fn current_symbol(&self) -> UpstreamResult<String>;
}

impl<U: UpstreamValueSource + ?Sized> UpstreamValueSource for &U {
    fn current_total_supply(&self) -> UpstreamResult<BigInt> {
        (**self).current_total_supply()
    }

    fn current_name(&self) -> UpstreamResult<String> {
        (**self).current_name()
    }

    fn current_symbol(&self) -> UpstreamResult<String> {
        (**self).current_symbol()
    }
}

impl<U: UpstreamValueSource + ?Sized> UpstreamValueSource for Arc<U> {
    fn current_total_supply(&self) -> UpstreamResult<BigInt> {
        (**self).current_total_supply()
    }

    fn current_name(&self) -> UpstreamResult<String> {
        (**self).current_name()
    }

    fn current_symbol(&self) -> UpstreamResult<String> {
        (**self).current_symbol()
    }
}

/// Upstream source with values known ahead of time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedUpstream {
    total_supply: BigInt,
    name: String,
    symbol: String,
}

impl FixedUpstream {
    pub fn new(total_supply: impl Into<BigInt>, name: &str, symbol: &str) -> Self {
        Self {
            total_supply: total_supply.into(),
            name: name.to_string(),
            symbol: symbol.to_string(),
        }
    }
}

impl UpstreamValueSource for FixedUpstream {
    fn current_total_supply(&self) -> UpstreamResult<BigInt> {
        Ok(self.total_supply.clone())
    }

    fn current_name(&self) -> UpstreamResult<String> {
        Ok(self.name.clone())
    }

    fn current_symbol(&self) -> UpstreamResult<String> {
        Ok(self.symbol.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_upstream_reads() {
        let upstream = FixedUpstream::new(1_000_000u64, "Token", "TKN");
        assert_eq!(upstream.current_total_supply().unwrap(), BigInt::from(1_000_000u64));
        assert_eq!(upstream.current_name().unwrap(), "Token");
        assert_eq!(upstream.current_symbol().unwrap(), "TKN");
    }

    #[test]
    fn test_shared_upstream_delegates() {
        let upstream = Arc::new(FixedUpstream::new(5u8, "A", "B"));
        let by_ref = &upstream;
        assert_eq!(by_ref.current_name().unwrap(), "A");
        assert_eq!(upstream.current_total_supply().unwrap(), BigInt::from(5));
    }
}
