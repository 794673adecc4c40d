//! Rebalance decision engine.
//!
//! Emits a recommendation per asset pair whose yield divergence clears the
//! threshold, but only while the external market signal is fresh and at or
//! above its own threshold. The two gates are independent and AND-combined:
//! a weak market signal suppresses every recommendation no matter how wide
//! the yield spread is.

use crate::oracle::MarketSnapshot;
use crate::vault::AssetYield;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

/// Gating thresholds for rebalance recommendations.
#[derive(Debug, Clone)]
pub struct RebalanceThresholds {
    /// Minimum yield divergence between a pair, exclusive (0.15 = 15 points).
    pub divergence: Decimal,
    /// Minimum market probability, inclusive (0.60 = 60%).
    pub min_probability: Decimal,
    /// Market snapshots older than this are ignored.
    pub max_signal_age: Duration,
}

impl Default for RebalanceThresholds {
    fn default() -> Self {
        Self {
            divergence: dec!(0.15),
            min_probability: dec!(0.60),
            max_signal_age: Duration::hours(1),
        }
    }
}

/// A recommendation to move capital from a lower-yield asset to a
/// higher-yield one. Advisory only; nothing executes it automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalanceSignal {
    pub from_asset: String,
    pub to_asset: String,
    pub from_rate: Decimal,
    pub to_rate: Decimal,
    pub delta: Decimal,
}

/// Pure decision function over cached yields and the market signal.
pub struct RebalanceEngine {
    thresholds: RebalanceThresholds,
}

impl RebalanceEngine {
    pub fn new(thresholds: RebalanceThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate every unordered asset pair and return the recommendations
    /// that clear both gates. May return several signals per evaluation.
    pub fn evaluate(
        &self,
        now: DateTime<Utc>,
        yields: &[AssetYield],
        market: Option<&MarketSnapshot>,
    ) -> Vec<RebalanceSignal> {
        let Some(market) = market else {
            debug!("no market signal available, suppressing rebalance checks");
            return Vec::new();
        };
        if market.is_stale(now, self.thresholds.max_signal_age) {
            warn!(
                last_updated = %market.last_updated,
                "market signal stale, suppressing rebalance checks"
            );
            return Vec::new();
        }
        if market.probability < self.thresholds.min_probability {
            debug!(
                probability = %market.probability,
                threshold = %self.thresholds.min_probability,
                "market probability below threshold, no rebalance"
            );
            return Vec::new();
        }

        let mut signals = Vec::new();
        for (i, a) in yields.iter().enumerate() {
            for b in &yields[i + 1..] {
                // order each pair low -> high so the signal always points
                // toward the higher yield
                let (low, high) = if a.rate <= b.rate { (a, b) } else { (b, a) };
                let delta = high.rate - low.rate;
                if delta > self.thresholds.divergence {
                    info!(
                        from = %low.asset,
                        to = %high.asset,
                        from_rate = %low.rate,
                        to_rate = %high.rate,
                        %delta,
                        "rebalance signal"
                    );
                    signals.push(RebalanceSignal {
                        from_asset: low.asset.clone(),
                        to_asset: high.asset.clone(),
                        from_rate: low.rate,
                        to_rate: high.rate,
                        delta,
                    });
                }
            }
        }
        signals
    }
}

impl Default for RebalanceEngine {
    fn default() -> Self {
        Self::new(RebalanceThresholds::default())
    }
}
