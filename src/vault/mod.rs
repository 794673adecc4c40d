//! Multi-asset yield vault with 1:1 share accounting.
//!
//! Shares are fungible across assets: depositing any supported asset mints
//! shares 1:1, and shares redeem against any asset the vault holds enough
//! of, independent of which asset minted them. That cross-asset fungibility
//! is deliberate and covered by tests in `ledger`.

mod ledger;

pub use ledger::VaultLedger;

use crate::oracle::OracleError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors for vault operations.
///
/// Every operation validates preconditions first and fails atomically;
/// callers retry with corrected inputs rather than recovering in place.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("unsupported asset {0}")]
    UnsupportedAsset(String),
    #[error("asset {0} is already registered")]
    AssetAlreadyRegistered(String),
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error("deposit cap exceeded: cap {cap}, outstanding {outstanding}, requested {requested}")]
    CapExceeded {
        cap: Decimal,
        outstanding: Decimal,
        requested: Decimal,
    },
    #[error("insufficient vault balance of asset: available {available}, requested {requested}")]
    InsufficientAssetBalance {
        available: Decimal,
        requested: Decimal,
    },
    #[error("insufficient shares: available {available}, requested {requested}")]
    InsufficientShares {
        available: Decimal,
        requested: Decimal,
    },
    #[error("caller {0} is not the vault owner")]
    Unauthorized(String),
    #[error("no yield oracle configured for asset {0}")]
    OracleNotConfigured(String),
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// A cached yield observation paired with its asset, as consumed by the
/// rebalance engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetYield {
    pub asset: String,
    pub rate: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// Record of a completed deposit.
#[derive(Debug, Clone)]
pub struct DepositReceipt {
    pub caller: String,
    pub receiver: String,
    pub asset: String,
    pub amount: Decimal,
    pub shares: Decimal,
    pub at: DateTime<Utc>,
}

/// Record of a completed withdrawal.
#[derive(Debug, Clone)]
pub struct WithdrawReceipt {
    pub caller: String,
    pub receiver: String,
    pub owner: String,
    pub asset: String,
    pub amount: Decimal,
    pub shares: Decimal,
    pub at: DateTime<Utc>,
}
