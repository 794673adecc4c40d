//! Oracle boundary for external yield and market-probability sources.
//!
//! Real sources are network services (yield aggregators, prediction
//! markets) and can fail or go stale; the traits here normalize them to
//! timestamped snapshots so callers can judge freshness themselves.

pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced at the oracle boundary.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("no rate published for asset {0}")]
    NoData(String),
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// An annualized yield rate observation for a single asset.
///
/// `rate` is a plain decimal fraction (0.04 = 4% APR).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YieldQuote {
    pub rate: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl YieldQuote {
    /// Age of this observation relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.observed_at
    }

    /// Whether the observation is older than `max_age`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) > max_age
    }
}

/// A market-confidence probability observation in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketSnapshot {
    pub probability: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_updated
    }

    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) > max_age
    }
}

/// Source of per-asset annualized yield estimates.
#[async_trait]
pub trait YieldSource: Send + Sync {
    /// Fetch the current rate estimate for `asset`.
    async fn rate(&self, asset: &str) -> Result<YieldQuote, OracleError>;
}

/// Source of an external market-probability signal.
#[async_trait]
pub trait MarketSignalSource: Send + Sync {
    /// Fetch the latest probability estimate with its update time.
    async fn probability(&self) -> Result<MarketSnapshot, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_staleness() {
        let now = Utc::now();
        let quote = YieldQuote {
            rate: dec!(0.04),
            observed_at: now - Duration::seconds(90),
        };
        assert!(!quote.is_stale(now, Duration::seconds(120)));
        assert!(quote.is_stale(now, Duration::seconds(60)));
    }

    #[test]
    fn test_snapshot_age() {
        let now = Utc::now();
        let snap = MarketSnapshot {
            probability: dec!(0.6),
            last_updated: now - Duration::seconds(30),
        };
        assert_eq!(snap.age(now), Duration::seconds(30));
        assert!(!snap.is_stale(now, Duration::seconds(30)));
    }
}
