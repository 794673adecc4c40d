//! Fungible share token ledger.
//!
//! Balance/allowance semantics follow the usual token-transfer contract:
//! `transfer_from` spends a prior `approve`, minting is owner-gated. The
//! bridge escrows this token on its source chain and mints it on delivery.

use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Errors for token ledger operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Decimal, need: Decimal },
    #[error("insufficient allowance: have {have}, need {need}")]
    InsufficientAllowance { have: Decimal, need: Decimal },
    #[error("caller {0} is not the token owner")]
    Unauthorized(String),
}

/// In-process fungible token ledger.
///
/// One instance exists per chain; the two bridge endpoints each own an
/// independent ledger and never share state.
#[derive(Debug)]
pub struct ShareToken {
    name: String,
    symbol: String,
    owner: String,
    balances: HashMap<String, Decimal>,
    /// (holder, spender) -> remaining allowance
    allowances: HashMap<(String, String), Decimal>,
    total_supply: Decimal,
}

impl ShareToken {
    pub fn new(name: &str, symbol: &str, owner: &str) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            owner: owner.to_string(),
            balances: HashMap::new(),
            allowances: HashMap::new(),
            total_supply: Decimal::ZERO,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn total_supply(&self) -> Decimal {
        self.total_supply
    }

    pub fn balance_of(&self, holder: &str) -> Decimal {
        self.balances.get(holder).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn allowance(&self, holder: &str, spender: &str) -> Decimal {
        self.allowances
            .get(&(holder.to_string(), spender.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Mint new tokens to `to`. Owner-only.
    pub fn mint(&mut self, caller: &str, to: &str, amount: Decimal) -> Result<(), TokenError> {
        if caller != self.owner {
            return Err(TokenError::Unauthorized(caller.to_string()));
        }
        if amount <= Decimal::ZERO {
            return Err(TokenError::ZeroAmount);
        }
        *self.balances.entry(to.to_string()).or_default() += amount;
        self.total_supply += amount;
        debug!(token = %self.symbol, %to, %amount, "minted");
        Ok(())
    }

    /// Move `amount` from `from` to `to`.
    pub fn transfer(&mut self, from: &str, to: &str, amount: Decimal) -> Result<(), TokenError> {
        if amount <= Decimal::ZERO {
            return Err(TokenError::ZeroAmount);
        }
        let have = self.balance_of(from);
        if have < amount {
            return Err(TokenError::InsufficientBalance { have, need: amount });
        }
        *self.balances.entry(from.to_string()).or_default() -= amount;
        *self.balances.entry(to.to_string()).or_default() += amount;
        Ok(())
    }

    /// Grant `spender` the right to move up to `amount` of `holder`'s tokens.
    pub fn approve(&mut self, holder: &str, spender: &str, amount: Decimal) {
        self.allowances
            .insert((holder.to_string(), spender.to_string()), amount);
    }

    /// Spend an allowance: move `amount` of `holder`'s tokens to `to` on
    /// behalf of `spender`. Allowance is checked before balance and
    /// decremented only on success.
    pub fn transfer_from(
        &mut self,
        spender: &str,
        holder: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<(), TokenError> {
        if amount <= Decimal::ZERO {
            return Err(TokenError::ZeroAmount);
        }
        let allowed = self.allowance(holder, spender);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                have: allowed,
                need: amount,
            });
        }
        let have = self.balance_of(holder);
        if have < amount {
            return Err(TokenError::InsufficientBalance { have, need: amount });
        }
        self.allowances
            .insert((holder.to_string(), spender.to_string()), allowed - amount);
        *self.balances.entry(holder.to_string()).or_default() -= amount;
        *self.balances.entry(to.to_string()).or_default() += amount;
        Ok(())
    }
}
