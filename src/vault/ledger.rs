//! The vault ledger: per-asset balances, caps, oracles and share accounting.

use super::{AssetYield, DepositReceipt, VaultError, WithdrawReceipt};
use crate::oracle::{YieldQuote, YieldSource};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-asset bookkeeping.
///
/// `deposited` and `withdrawn` are lifetime accumulators; the vault's
/// custodial balance of the asset is always their difference.
struct AssetRecord {
    max_deposit: Decimal,
    deposited: Decimal,
    withdrawn: Decimal,
    cached_yield: Option<YieldQuote>,
    oracle: Option<Arc<dyn YieldSource>>,
}

impl AssetRecord {
    fn outstanding(&self) -> Decimal {
        self.deposited - self.withdrawn
    }
}

/// Multi-asset vault ledger with 1:1 share accounting.
///
/// Owns the per-asset balances and the share ledger exclusively; the yield
/// oracle binding is informational only and never affects accounting.
pub struct VaultLedger {
    owner: String,
    assets: HashMap<String, AssetRecord>,
    /// Registration order, for stable iteration and reporting.
    asset_order: Vec<String>,
    shares: HashMap<String, Decimal>,
    /// (holder, spender) -> remaining share allowance
    share_allowances: HashMap<(String, String), Decimal>,
    total_shares: Decimal,
}

impl VaultLedger {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            assets: HashMap::new(),
            asset_order: Vec::new(),
            shares: HashMap::new(),
            share_allowances: HashMap::new(),
            total_shares: Decimal::ZERO,
        }
    }

    /// Register a supported asset with its deposit cap. Owner-only; assets
    /// are never removed once registered.
    pub fn add_asset(
        &mut self,
        caller: &str,
        asset: &str,
        max_deposit: Decimal,
    ) -> Result<(), VaultError> {
        self.require_owner(caller)?;
        if self.assets.contains_key(asset) {
            return Err(VaultError::AssetAlreadyRegistered(asset.to_string()));
        }
        self.assets.insert(
            asset.to_string(),
            AssetRecord {
                max_deposit,
                deposited: Decimal::ZERO,
                withdrawn: Decimal::ZERO,
                cached_yield: None,
                oracle: None,
            },
        );
        self.asset_order.push(asset.to_string());
        info!(%asset, %max_deposit, "asset registered");
        Ok(())
    }

    /// Deposit `amount` of `asset`, minting shares 1:1 to `receiver`.
    pub fn deposit(
        &mut self,
        caller: &str,
        asset: &str,
        amount: Decimal,
        receiver: &str,
    ) -> Result<DepositReceipt, VaultError> {
        if amount <= Decimal::ZERO {
            return Err(VaultError::ZeroAmount);
        }
        let record = self
            .assets
            .get(asset)
            .ok_or_else(|| VaultError::UnsupportedAsset(asset.to_string()))?;
        let outstanding = record.outstanding();
        if outstanding + amount > record.max_deposit {
            return Err(VaultError::CapExceeded {
                cap: record.max_deposit,
                outstanding,
                requested: amount,
            });
        }

        // Preconditions hold; mutate in one step.
        if let Some(record) = self.assets.get_mut(asset) {
            record.deposited += amount;
        }
        *self.shares.entry(receiver.to_string()).or_default() += amount;
        self.total_shares += amount;

        let receipt = DepositReceipt {
            caller: caller.to_string(),
            receiver: receiver.to_string(),
            asset: asset.to_string(),
            amount,
            shares: amount,
            at: Utc::now(),
        };
        info!(%caller, %receiver, %asset, %amount, "deposit");
        Ok(receipt)
    }

    /// Withdraw `amount` of `asset` to `receiver`, burning `owner`'s shares
    /// 1:1. A caller other than `owner` spends a prior share allowance.
    ///
    /// The asset withdrawn need not be the asset that minted the shares;
    /// any asset with sufficient vault balance is redeemable.
    pub fn withdraw(
        &mut self,
        caller: &str,
        asset: &str,
        amount: Decimal,
        receiver: &str,
        owner: &str,
    ) -> Result<WithdrawReceipt, VaultError> {
        if amount <= Decimal::ZERO {
            return Err(VaultError::ZeroAmount);
        }
        let record = self
            .assets
            .get(asset)
            .ok_or_else(|| VaultError::UnsupportedAsset(asset.to_string()))?;
        let available = record.outstanding();
        if available < amount {
            return Err(VaultError::InsufficientAssetBalance {
                available,
                requested: amount,
            });
        }
        let owner_shares = self.share_balance(owner);
        let effective = if caller == owner {
            owner_shares
        } else {
            owner_shares.min(self.share_allowance(owner, caller))
        };
        if effective < amount {
            return Err(VaultError::InsufficientShares {
                available: effective,
                requested: amount,
            });
        }

        if caller != owner {
            let allowed = self.share_allowance(owner, caller);
            self.share_allowances
                .insert((owner.to_string(), caller.to_string()), allowed - amount);
        }
        if let Some(record) = self.assets.get_mut(asset) {
            record.withdrawn += amount;
        }
        *self.shares.entry(owner.to_string()).or_default() -= amount;
        self.total_shares -= amount;

        let receipt = WithdrawReceipt {
            caller: caller.to_string(),
            receiver: receiver.to_string(),
            owner: owner.to_string(),
            asset: asset.to_string(),
            amount,
            shares: amount,
            at: Utc::now(),
        };
        info!(%caller, %receiver, %owner, %asset, %amount, "withdraw");
        Ok(receipt)
    }

    /// Grant `spender` the right to burn up to `amount` of `owner`'s shares.
    pub fn approve_shares(&mut self, owner: &str, spender: &str, amount: Decimal) {
        self.share_allowances
            .insert((owner.to_string(), spender.to_string()), amount);
    }

    /// Shares minted for a deposit of `amount`. Pure; always 1:1.
    pub fn preview_deposit(&self, asset: &str, amount: Decimal) -> Result<Decimal, VaultError> {
        if !self.assets.contains_key(asset) {
            return Err(VaultError::UnsupportedAsset(asset.to_string()));
        }
        Ok(amount)
    }

    /// Shares burned for a withdrawal of `amount`. Pure; always 1:1.
    pub fn preview_withdraw(&self, asset: &str, amount: Decimal) -> Result<Decimal, VaultError> {
        if !self.assets.contains_key(asset) {
            return Err(VaultError::UnsupportedAsset(asset.to_string()));
        }
        Ok(amount)
    }

    /// Update an asset's deposit cap. Owner-only.
    pub fn set_max_deposit(
        &mut self,
        caller: &str,
        asset: &str,
        max_deposit: Decimal,
    ) -> Result<(), VaultError> {
        self.require_owner(caller)?;
        let record = self
            .assets
            .get_mut(asset)
            .ok_or_else(|| VaultError::UnsupportedAsset(asset.to_string()))?;
        record.max_deposit = max_deposit;
        info!(%asset, %max_deposit, "deposit cap updated");
        Ok(())
    }

    /// Bind (or rebind) a yield oracle to an asset. Owner-only.
    pub fn set_yield_source(
        &mut self,
        caller: &str,
        asset: &str,
        source: Arc<dyn YieldSource>,
    ) -> Result<(), VaultError> {
        self.require_owner(caller)?;
        let record = self
            .assets
            .get_mut(asset)
            .ok_or_else(|| VaultError::UnsupportedAsset(asset.to_string()))?;
        record.oracle = Some(source);
        info!(%asset, "yield oracle bound");
        Ok(())
    }

    /// Fetch the current yield for `asset` from its oracle, caching the
    /// observation. A failed fetch falls back to the cached quote; stale
    /// data is acceptable as long as its timestamp is visible to callers.
    pub async fn get_asset_yield(&mut self, asset: &str) -> Result<YieldQuote, VaultError> {
        let record = self
            .assets
            .get(asset)
            .ok_or_else(|| VaultError::UnsupportedAsset(asset.to_string()))?;
        let oracle = record
            .oracle
            .clone()
            .ok_or_else(|| VaultError::OracleNotConfigured(asset.to_string()))?;

        match oracle.rate(asset).await {
            Ok(quote) => {
                if let Some(record) = self.assets.get_mut(asset) {
                    record.cached_yield = Some(quote);
                }
                debug!(%asset, rate = %quote.rate, "yield updated");
                Ok(quote)
            }
            Err(err) => match self.assets.get(asset).and_then(|r| r.cached_yield) {
                Some(stale) => {
                    warn!(%asset, %err, observed_at = %stale.observed_at, "oracle fetch failed, serving cached yield");
                    Ok(stale)
                }
                None => Err(err.into()),
            },
        }
    }

    /// Last cached yield observation for `asset`, if any.
    pub fn stored_yield(&self, asset: &str) -> Result<Option<YieldQuote>, VaultError> {
        self.assets
            .get(asset)
            .map(|r| r.cached_yield)
            .ok_or_else(|| VaultError::UnsupportedAsset(asset.to_string()))
    }

    /// Cached yields for all assets that have one, in registration order.
    /// This snapshot is the only input the rebalance engine sees.
    pub fn yield_snapshot(&self) -> Vec<AssetYield> {
        self.asset_order
            .iter()
            .filter_map(|asset| {
                let quote = self.assets.get(asset)?.cached_yield?;
                Some(AssetYield {
                    asset: asset.clone(),
                    rate: quote.rate,
                    observed_at: quote.observed_at,
                })
            })
            .collect()
    }

    pub fn supported_assets(&self) -> &[String] {
        &self.asset_order
    }

    pub fn is_supported(&self, asset: &str) -> bool {
        self.assets.contains_key(asset)
    }

    pub fn max_deposit(&self, asset: &str) -> Result<Decimal, VaultError> {
        self.assets
            .get(asset)
            .map(|r| r.max_deposit)
            .ok_or_else(|| VaultError::UnsupportedAsset(asset.to_string()))
    }

    /// Custodial balance of a single asset (deposited minus withdrawn).
    pub fn total_assets_of(&self, asset: &str) -> Result<Decimal, VaultError> {
        self.assets
            .get(asset)
            .map(|r| r.outstanding())
            .ok_or_else(|| VaultError::UnsupportedAsset(asset.to_string()))
    }

    /// Sum of custodial balances across all assets. Always equals the total
    /// share supply.
    pub fn total_assets(&self) -> Decimal {
        self.assets.values().map(|r| r.outstanding()).sum()
    }

    pub fn total_shares(&self) -> Decimal {
        self.total_shares
    }

    pub fn share_balance(&self, holder: &str) -> Decimal {
        self.shares.get(holder).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn share_allowance(&self, owner: &str, spender: &str) -> Decimal {
        self.share_allowances
            .get(&(owner.to_string(), spender.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn require_owner(&self, caller: &str) -> Result<(), VaultError> {
        if caller != self.owner {
            return Err(VaultError::Unauthorized(caller.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::mock::MockYieldSource;
    use rust_decimal_macros::dec;

    const OWNER: &str = "owner";

    fn vault_with_assets() -> VaultLedger {
        let mut vault = VaultLedger::new(OWNER);
        vault.add_asset(OWNER, "stETH", dec!(1000)).unwrap();
        vault.add_asset(OWNER, "rETH", dec!(1000)).unwrap();
        vault.add_asset(OWNER, "sAVAX", dec!(1000)).unwrap();
        vault
    }

    /// Every accounting invariant the ledger promises, checked in one place.
    fn assert_invariants(vault: &VaultLedger) {
        let per_asset_sum: Decimal = vault
            .supported_assets()
            .iter()
            .map(|a| vault.total_assets_of(a).unwrap())
            .sum();
        assert_eq!(vault.total_assets(), per_asset_sum);
        assert_eq!(vault.total_shares(), per_asset_sum);
        let holder_sum: Decimal = vault.shares.values().copied().sum();
        assert_eq!(vault.total_shares(), holder_sum);
    }

    #[test]
    fn test_deposit_mints_shares_one_to_one() {
        let mut vault = vault_with_assets();
        let receipt = vault.deposit("alice", "stETH", dec!(100), "alice").unwrap();
        assert_eq!(receipt.shares, dec!(100));
        assert_eq!(vault.share_balance("alice"), dec!(100));
        assert_eq!(vault.total_assets_of("stETH").unwrap(), dec!(100));
        assert_invariants(&vault);
    }

    #[test]
    fn test_deposit_to_other_receiver() {
        let mut vault = vault_with_assets();
        vault.deposit("alice", "stETH", dec!(100), "bob").unwrap();
        assert_eq!(vault.share_balance("alice"), Decimal::ZERO);
        assert_eq!(vault.share_balance("bob"), dec!(100));
        assert_invariants(&vault);
    }

    #[test]
    fn test_deposit_validation() {
        let mut vault = vault_with_assets();
        assert!(matches!(
            vault.deposit("alice", "wBTC", dec!(1), "alice"),
            Err(VaultError::UnsupportedAsset(_))
        ));
        assert!(matches!(
            vault.deposit("alice", "stETH", Decimal::ZERO, "alice"),
            Err(VaultError::ZeroAmount)
        ));
        assert!(matches!(
            vault.deposit("alice", "stETH", dec!(1001), "alice"),
            Err(VaultError::CapExceeded { .. })
        ));
        // failed deposits leave no trace
        assert_eq!(vault.total_assets(), Decimal::ZERO);
        assert_eq!(vault.total_shares(), Decimal::ZERO);
        assert_invariants(&vault);
    }

    #[test]
    fn test_cap_bounds_outstanding_not_lifetime_deposits() {
        let mut vault = vault_with_assets();
        vault.deposit("alice", "stETH", dec!(1000), "alice").unwrap();
        assert!(matches!(
            vault.deposit("bob", "stETH", dec!(1), "bob"),
            Err(VaultError::CapExceeded { .. })
        ));
        vault
            .withdraw("alice", "stETH", dec!(1000), "alice", "alice")
            .unwrap();
        // cap applies to outstanding deposits, so room reopens
        vault.deposit("alice", "stETH", dec!(1000), "alice").unwrap();
        assert_invariants(&vault);
    }

    #[test]
    fn test_withdraw_happy_path() {
        let mut vault = vault_with_assets();
        vault.deposit("alice", "stETH", dec!(100), "alice").unwrap();
        let receipt = vault
            .withdraw("alice", "stETH", dec!(40), "alice", "alice")
            .unwrap();
        assert_eq!(receipt.shares, dec!(40));
        assert_eq!(vault.share_balance("alice"), dec!(60));
        assert_eq!(vault.total_assets_of("stETH").unwrap(), dec!(60));
        assert_invariants(&vault);
    }

    #[test]
    fn test_cross_asset_share_fungibility() {
        let mut vault = vault_with_assets();
        vault.deposit("alice", "stETH", dec!(100), "alice").unwrap();
        vault.deposit("bob", "rETH", dec!(100), "bob").unwrap();

        // alice's shares came from stETH but redeem against rETH
        vault
            .withdraw("alice", "rETH", dec!(80), "alice", "alice")
            .unwrap();
        assert_eq!(vault.share_balance("alice"), dec!(20));
        assert_eq!(vault.total_assets_of("rETH").unwrap(), dec!(20));
        assert_eq!(vault.total_assets_of("stETH").unwrap(), dec!(100));
        assert_invariants(&vault);
    }

    #[test]
    fn test_withdraw_validation() {
        let mut vault = vault_with_assets();
        vault.deposit("alice", "stETH", dec!(100), "alice").unwrap();
        vault.deposit("bob", "rETH", dec!(500), "bob").unwrap();

        assert!(matches!(
            vault.withdraw("alice", "stETH", Decimal::ZERO, "alice", "alice"),
            Err(VaultError::ZeroAmount)
        ));
        // vault holds only 100 stETH even though bob's deposit grew supply
        assert!(matches!(
            vault.withdraw("alice", "stETH", dec!(101), "alice", "alice"),
            Err(VaultError::InsufficientAssetBalance { .. })
        ));
        // alice has only 100 shares against a 500 rETH vault balance
        assert!(matches!(
            vault.withdraw("alice", "rETH", dec!(101), "alice", "alice"),
            Err(VaultError::InsufficientShares { .. })
        ));
        // failures mutated nothing
        assert_eq!(vault.share_balance("alice"), dec!(100));
        assert_eq!(vault.total_assets_of("stETH").unwrap(), dec!(100));
        assert_invariants(&vault);
    }

    #[test]
    fn test_withdraw_with_share_allowance() {
        let mut vault = vault_with_assets();
        vault.deposit("alice", "stETH", dec!(100), "alice").unwrap();

        // no allowance yet
        assert!(matches!(
            vault.withdraw("bob", "stETH", dec!(25), "bob", "alice"),
            Err(VaultError::InsufficientShares { .. })
        ));

        vault.approve_shares("alice", "bob", dec!(25));
        vault
            .withdraw("bob", "stETH", dec!(25), "bob", "alice")
            .unwrap();
        assert_eq!(vault.share_balance("alice"), dec!(75));
        assert_eq!(vault.share_allowance("alice", "bob"), Decimal::ZERO);

        // allowance exhausted
        assert!(matches!(
            vault.withdraw("bob", "stETH", dec!(1), "bob", "alice"),
            Err(VaultError::InsufficientShares { .. })
        ));
        assert_invariants(&vault);
    }

    #[test]
    fn test_previews_are_pure_and_one_to_one() {
        let vault = vault_with_assets();
        assert_eq!(vault.preview_deposit("stETH", dec!(42)).unwrap(), dec!(42));
        assert_eq!(vault.preview_withdraw("rETH", dec!(42)).unwrap(), dec!(42));
        assert!(matches!(
            vault.preview_deposit("wBTC", dec!(42)),
            Err(VaultError::UnsupportedAsset(_))
        ));
        assert!(matches!(
            vault.preview_withdraw("wBTC", dec!(42)),
            Err(VaultError::UnsupportedAsset(_))
        ));
    }

    #[test]
    fn test_admin_gating() {
        let mut vault = vault_with_assets();
        assert!(matches!(
            vault.set_max_deposit("mallory", "stETH", dec!(5000)),
            Err(VaultError::Unauthorized(_))
        ));
        vault.set_max_deposit(OWNER, "stETH", dec!(2000)).unwrap();
        assert_eq!(vault.max_deposit("stETH").unwrap(), dec!(2000));

        let oracle = Arc::new(MockYieldSource::new());
        assert!(matches!(
            vault.set_yield_source("mallory", "stETH", oracle.clone()),
            Err(VaultError::Unauthorized(_))
        ));
        assert!(matches!(
            vault.set_max_deposit(OWNER, "wBTC", dec!(1)),
            Err(VaultError::UnsupportedAsset(_))
        ));
    }

    #[tokio::test]
    async fn test_yield_fetch_and_cache() {
        let mut vault = vault_with_assets();
        let oracle = Arc::new(MockYieldSource::new());
        oracle.set_rate("stETH", dec!(0.04)).await;
        vault.set_yield_source(OWNER, "stETH", oracle.clone()).unwrap();

        let quote = vault.get_asset_yield("stETH").await.unwrap();
        assert_eq!(quote.rate, dec!(0.04));
        assert_eq!(
            vault.stored_yield("stETH").unwrap().unwrap().rate,
            dec!(0.04)
        );

        let snapshot = vault.yield_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].asset, "stETH");
    }

    #[tokio::test]
    async fn test_yield_requires_oracle() {
        let mut vault = vault_with_assets();
        assert!(matches!(
            vault.get_asset_yield("stETH").await,
            Err(VaultError::OracleNotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_stale_yield_served_on_oracle_failure() {
        let mut vault = vault_with_assets();
        let oracle = Arc::new(MockYieldSource::new());
        oracle.set_rate("stETH", dec!(0.05)).await;
        vault.set_yield_source(OWNER, "stETH", oracle.clone()).unwrap();

        let fresh = vault.get_asset_yield("stETH").await.unwrap();
        oracle.set_failing(true).await;

        let stale = vault.get_asset_yield("stETH").await.unwrap();
        assert_eq!(stale.rate, dec!(0.05));
        assert_eq!(stale.observed_at, fresh.observed_at);
    }

    #[tokio::test]
    async fn test_oracle_failure_without_cache_propagates() {
        let mut vault = vault_with_assets();
        let oracle = Arc::new(MockYieldSource::new());
        oracle.set_failing(true).await;
        vault.set_yield_source(OWNER, "stETH", oracle).unwrap();

        assert!(matches!(
            vault.get_asset_yield("stETH").await,
            Err(VaultError::Oracle(_))
        ));
    }
}
