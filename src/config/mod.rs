//! Configuration management for the LST vault service.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bridge::{ChainId, FUJI_CHAIN_SELECTOR, SEPOLIA_CHAIN_SELECTOR};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Vault asset settings
    #[serde(default)]
    pub vault: VaultConfig,
    /// Automation and harvest parameters
    #[serde(default)]
    pub automation: AutomationConfig,
    /// Bridge endpoint settings
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Persistence settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Account that administers the vault and bridge
    #[serde(default = "default_owner")]
    pub owner: String,
    /// Assets registered at startup
    #[serde(default = "default_assets")]
    pub assets: Vec<String>,
    /// Per-asset deposit cap, applied to outstanding deposits
    #[serde(default = "default_max_deposit")]
    pub max_deposit_per_asset: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Seconds between harvests
    #[serde(default = "default_upkeep_interval_secs")]
    pub upkeep_interval_secs: u64,
    /// Minimum yield divergence between a pair to recommend rebalancing,
    /// exclusive (0.15 = 15 percentage points)
    #[serde(default = "default_divergence_threshold")]
    pub divergence_threshold: Decimal,
    /// Minimum market probability to allow rebalancing, inclusive
    #[serde(default = "default_probability_threshold")]
    pub probability_threshold: Decimal,
    /// Market snapshots older than this are ignored
    #[serde(default = "default_max_signal_age_secs")]
    pub max_signal_age_secs: u64,
    /// Reward accrual rate per hour, applied to total vault assets
    #[serde(default = "default_harvest_rate_per_hour")]
    pub harvest_rate_per_hour: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Selector of the chain this endpoint runs on
    #[serde(default = "default_local_chain")]
    pub local_chain: ChainId,
    /// Destination selectors accepted by `send`
    #[serde(default = "default_supported_chains")]
    pub supported_chains: Vec<ChainId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

// Default value functions
fn default_owner() -> String {
    "operator".to_string()
}

fn default_assets() -> Vec<String> {
    vec!["stETH".to_string(), "rETH".to_string(), "sAVAX".to_string()]
}

fn default_max_deposit() -> Decimal {
    Decimal::new(1_000_000, 0) // 1M units per asset
}

fn default_upkeep_interval_secs() -> u64 {
    3600 // hourly harvests
}

fn default_divergence_threshold() -> Decimal {
    Decimal::new(15, 2) // 0.15 = 15 percentage points
}

fn default_probability_threshold() -> Decimal {
    Decimal::new(60, 2) // 0.60
}

fn default_max_signal_age_secs() -> u64 {
    3600
}

fn default_harvest_rate_per_hour() -> Decimal {
    Decimal::new(1, 4) // 0.0001 per hour on total assets
}

fn default_local_chain() -> ChainId {
    SEPOLIA_CHAIN_SELECTOR
}

fn default_supported_chains() -> Vec<ChainId> {
    vec![FUJI_CHAIN_SELECTOR]
}

fn default_db_path() -> String {
    "lst_vault.db".to_string()
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("LSTV"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.vault.owner.is_empty(), "owner must not be empty");

        anyhow::ensure!(!self.vault.assets.is_empty(), "at least one asset required");

        anyhow::ensure!(
            self.vault.max_deposit_per_asset > Decimal::ZERO,
            "max_deposit_per_asset must be positive"
        );

        anyhow::ensure!(
            self.automation.upkeep_interval_secs > 0,
            "upkeep_interval_secs must be positive"
        );

        anyhow::ensure!(
            self.automation.divergence_threshold > Decimal::ZERO
                && self.automation.divergence_threshold < Decimal::ONE,
            "divergence_threshold must be between 0 and 1"
        );

        anyhow::ensure!(
            self.automation.probability_threshold > Decimal::ZERO
                && self.automation.probability_threshold <= Decimal::ONE,
            "probability_threshold must be between 0 and 1"
        );

        anyhow::ensure!(
            !self.bridge.supported_chains.contains(&self.bridge.local_chain),
            "local chain must not appear in supported destination chains"
        );

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vault: VaultConfig::default(),
            automation: AutomationConfig::default(),
            bridge: BridgeConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            assets: default_assets(),
            max_deposit_per_asset: default_max_deposit(),
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            upkeep_interval_secs: default_upkeep_interval_secs(),
            divergence_threshold: default_divergence_threshold(),
            probability_threshold: default_probability_threshold(),
            max_signal_age_secs: default_max_signal_age_secs(),
            harvest_rate_per_hour: default_harvest_rate_per_hour(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            local_chain: default_local_chain(),
            supported_chains: default_supported_chains(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}
