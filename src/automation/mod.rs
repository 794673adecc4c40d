//! Harvest automation and rebalance decisions.
//!
//! The scheduler is pull-based: external keepers poll `check_due` (pure) and
//! call `perform_harvest` when the interval has elapsed. The decision engine
//! is a pure function over the cached yield snapshot and the latest market
//! signal; it never fetches from an oracle itself.

mod engine;
mod scheduler;

pub use engine::{RebalanceEngine, RebalanceSignal, RebalanceThresholds};
pub use scheduler::{HarvestOutcome, HarvestState, UpkeepScheduler, UpkeepStatus};

use thiserror::Error;

/// Errors for scheduler operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpkeepError {
    #[error("upkeep not due yet")]
    UpkeepNotDue,
    #[error("caller {0} is not the scheduler owner")]
    Unauthorized(String),
}
