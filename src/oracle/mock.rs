//! Mock oracles for tests and paper-mode runs.

use super::{MarketSignalSource, MarketSnapshot, OracleError, YieldQuote, YieldSource};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Settable per-asset yield source with failure injection.
#[derive(Default)]
pub struct MockYieldSource {
    rates: Arc<RwLock<HashMap<String, Decimal>>>,
    failing: Arc<RwLock<bool>>,
}

impl MockYieldSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the published rate for an asset.
    pub async fn set_rate(&self, asset: &str, rate: Decimal) {
        self.rates.write().await.insert(asset.to_string(), rate);
    }

    /// Make every subsequent fetch fail (simulates an unreachable oracle).
    pub async fn set_failing(&self, failing: bool) {
        *self.failing.write().await = failing;
    }
}

#[async_trait]
impl YieldSource for MockYieldSource {
    async fn rate(&self, asset: &str) -> Result<YieldQuote, OracleError> {
        if *self.failing.read().await {
            return Err(OracleError::Unavailable("mock oracle offline".to_string()));
        }
        let rates = self.rates.read().await;
        match rates.get(asset) {
            Some(&rate) => Ok(YieldQuote {
                rate,
                observed_at: Utc::now(),
            }),
            None => Err(OracleError::NoData(asset.to_string())),
        }
    }
}

/// Settable market-probability source.
pub struct MockMarketSignal {
    snapshot: Arc<RwLock<MarketSnapshot>>,
    failing: Arc<RwLock<bool>>,
}

impl MockMarketSignal {
    pub fn new(probability: Decimal) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(MarketSnapshot {
                probability,
                last_updated: Utc::now(),
            })),
            failing: Arc::new(RwLock::new(false)),
        }
    }

    /// Update the published probability, refreshing the timestamp.
    pub async fn set_probability(&self, probability: Decimal) {
        *self.snapshot.write().await = MarketSnapshot {
            probability,
            last_updated: Utc::now(),
        };
    }

    /// Backdate the snapshot for staleness testing.
    pub async fn set_last_updated(&self, last_updated: chrono::DateTime<chrono::Utc>) {
        self.snapshot.write().await.last_updated = last_updated;
    }

    pub async fn set_failing(&self, failing: bool) {
        *self.failing.write().await = failing;
    }
}

#[async_trait]
impl MarketSignalSource for MockMarketSignal {
    async fn probability(&self) -> Result<MarketSnapshot, OracleError> {
        if *self.failing.read().await {
            return Err(OracleError::Unavailable("mock signal offline".to_string()));
        }
        Ok(*self.snapshot.read().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_yield_source_roundtrip() {
        let source = MockYieldSource::new();
        source.set_rate("stETH", dec!(0.04)).await;

        let quote = source.rate("stETH").await.unwrap();
        assert_eq!(quote.rate, dec!(0.04));

        assert!(matches!(
            source.rate("rETH").await,
            Err(OracleError::NoData(_))
        ));
    }

    #[tokio::test]
    async fn test_yield_source_failure_injection() {
        let source = MockYieldSource::new();
        source.set_rate("stETH", dec!(0.04)).await;
        source.set_failing(true).await;

        assert!(matches!(
            source.rate("stETH").await,
            Err(OracleError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_market_signal_update() {
        let signal = MockMarketSignal::new(dec!(0.5));
        assert_eq!(signal.probability().await.unwrap().probability, dec!(0.5));

        signal.set_probability(dec!(0.75)).await;
        assert_eq!(signal.probability().await.unwrap().probability, dec!(0.75));
    }
}
