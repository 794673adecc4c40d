//! # LST Vault
//!
//! A multi-asset liquid-staking-token yield vault with a lock-and-mint
//! cross-chain bridge and interval-gated rebalance automation.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `oracle`: Yield and market-probability source boundary (traits + mocks)
//! - `token`: Fungible share token ledger (balances, allowances, minting)
//! - `vault`: Multi-asset deposit/withdraw ledger with 1:1 share accounting
//! - `bridge`: Per-chain bridge router and message state machine
//! - `automation`: Harvest scheduler and rebalance decision engine
//! - `persistence`: SQLite-based event and message history
//! - `utils`: Shared utilities and decimal arithmetic

pub mod automation;
pub mod bridge;
pub mod config;
pub mod oracle;
pub mod persistence;
pub mod token;
pub mod utils;
pub mod vault;

pub use config::Config;
