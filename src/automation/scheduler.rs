//! Interval-gated harvest scheduler.
//!
//! `check_due` is a side-effect-free query that keepers may poll as often as
//! they like; only `perform_harvest` mutates state, and the host environment
//! applies each call atomically. All waiting happens in the caller.

use super::engine::{RebalanceEngine, RebalanceSignal};
use super::UpkeepError;
use crate::oracle::MarketSnapshot;
use crate::vault::AssetYield;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::info;

/// Harvest bookkeeping. `last_harvest_at` only ever moves forward and
/// `total_harvested` never decreases; both are mutated exclusively through
/// the scheduler's harvest path.
#[derive(Debug, Clone)]
pub struct HarvestState {
    pub last_harvest_at: Option<DateTime<Utc>>,
    pub total_harvested: Decimal,
    pub interval: Duration,
}

impl HarvestState {
    pub fn new(interval: Duration) -> Self {
        Self {
            last_harvest_at: None,
            total_harvested: Decimal::ZERO,
            interval,
        }
    }
}

/// Snapshot of the scheduler for status reporting.
#[derive(Debug, Clone)]
pub struct UpkeepStatus {
    pub time_until_next: Duration,
    pub due: bool,
    pub last_performed: Option<DateTime<Utc>>,
    pub total_harvested: Decimal,
}

/// Result of one harvest cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestOutcome {
    pub harvested: Decimal,
    pub total_harvested: Decimal,
    pub signals: Vec<RebalanceSignal>,
}

impl HarvestOutcome {
    pub fn rebalance_recommended(&self) -> bool {
        !self.signals.is_empty()
    }
}

/// Drives periodic yield harvesting and rebalance evaluation.
pub struct UpkeepScheduler {
    owner: String,
    state: HarvestState,
    engine: RebalanceEngine,
    /// Accrual rate per hour of elapsed time, applied to total vault assets.
    /// Placeholder business rule standing in for real reward collection.
    harvest_rate_per_hour: Decimal,
}

impl UpkeepScheduler {
    pub fn new(
        owner: &str,
        interval: Duration,
        engine: RebalanceEngine,
        harvest_rate_per_hour: Decimal,
    ) -> Self {
        Self {
            owner: owner.to_string(),
            state: HarvestState::new(interval),
            engine,
            harvest_rate_per_hour,
        }
    }

    /// Whether a harvest is due. Pure; `true` on first run or once the
    /// interval has elapsed since the last harvest.
    pub fn check_due(&self, now: DateTime<Utc>) -> bool {
        match self.state.last_harvest_at {
            None => true,
            Some(last) => now - last >= self.state.interval,
        }
    }

    /// Status snapshot for keepers and dashboards.
    pub fn upkeep_status(&self, now: DateTime<Utc>) -> UpkeepStatus {
        let time_until_next = match self.state.last_harvest_at {
            None => Duration::zero(),
            Some(last) => (last + self.state.interval - now).max(Duration::zero()),
        };
        UpkeepStatus {
            time_until_next,
            due: self.check_due(now),
            last_performed: self.state.last_harvest_at,
            total_harvested: self.state.total_harvested,
        }
    }

    /// Run one harvest cycle: accrue rewards, advance the clock, evaluate
    /// rebalance conditions. Fails with `UpkeepNotDue` while idle.
    pub fn perform_harvest(
        &mut self,
        now: DateTime<Utc>,
        total_assets: Decimal,
        yields: &[AssetYield],
        market: Option<&MarketSnapshot>,
    ) -> Result<HarvestOutcome, UpkeepError> {
        if !self.check_due(now) {
            return Err(UpkeepError::UpkeepNotDue);
        }
        Ok(self.harvest(now, total_assets, yields, market))
    }

    /// Owner-triggered harvest that bypasses the due check but follows the
    /// same accrual and evaluation path.
    pub fn manual_harvest(
        &mut self,
        caller: &str,
        now: DateTime<Utc>,
        total_assets: Decimal,
        yields: &[AssetYield],
        market: Option<&MarketSnapshot>,
    ) -> Result<HarvestOutcome, UpkeepError> {
        if caller != self.owner {
            return Err(UpkeepError::Unauthorized(caller.to_string()));
        }
        Ok(self.harvest(now, total_assets, yields, market))
    }

    pub fn state(&self) -> &HarvestState {
        &self.state
    }

    fn harvest(
        &mut self,
        now: DateTime<Utc>,
        total_assets: Decimal,
        yields: &[AssetYield],
        market: Option<&MarketSnapshot>,
    ) -> HarvestOutcome {
        // Elapsed time since the last harvest, capped at one interval for
        // the first run and clamped so a skewed clock cannot accrue
        // negative rewards.
        let elapsed = match self.state.last_harvest_at {
            None => self.state.interval,
            Some(last) => (now - last).max(Duration::zero()),
        };
        let elapsed_hours = Decimal::from(elapsed.num_seconds()) / Decimal::from(3600);
        let harvested = total_assets * self.harvest_rate_per_hour * elapsed_hours;

        self.state.total_harvested += harvested;
        // monotonic: never step the harvest clock backwards
        if self.state.last_harvest_at.map_or(true, |last| now > last) {
            self.state.last_harvest_at = Some(now);
        }

        let signals = self.engine.evaluate(now, yields, market);
        info!(
            %harvested,
            total_harvested = %self.state.total_harvested,
            signal_count = signals.len(),
            "harvest performed"
        );
        HarvestOutcome {
            harvested,
            total_harvested: self.state.total_harvested,
            signals,
        }
    }
}
