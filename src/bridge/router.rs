//! Per-chain bridge router: escrow, message state machine, recovery paths.

use super::{BridgeError, BridgeMessage, ChainId, MessageStatus, OutboundTransfer};
use crate::token::ShareToken;
use crate::utils::decimal::to_wad;
use chrono::Utc;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// One chain's bridge endpoint.
///
/// Owns the message map and the locked-pool counter for its chain
/// exclusively. Token movement goes through the chain's `ShareToken`
/// ledger, passed in per call; the router's escrow account inside that
/// ledger holds locked tokens.
pub struct BridgeRouter {
    chain: ChainId,
    owner: String,
    escrow_account: String,
    supported_chains: HashSet<ChainId>,
    messages: HashMap<String, BridgeMessage>,
    /// Tokens currently escrowed on this chain. Incremented on lock and
    /// released only through `emergency_withdraw`; destination-side
    /// outcomes never reconcile it automatically.
    total_locked: Decimal,
    nonce: u64,
}

impl BridgeRouter {
    pub fn new(chain: ChainId, owner: &str, supported_chains: &[ChainId]) -> Self {
        let escrow_account = format!("bridge-escrow-{chain}");
        Self {
            chain,
            owner: owner.to_string(),
            escrow_account,
            supported_chains: supported_chains.iter().copied().collect(),
            messages: HashMap::new(),
            total_locked: Decimal::ZERO,
            nonce: 0,
        }
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }

    /// Account users must approve before calling `send`.
    pub fn escrow_account(&self) -> &str {
        &self.escrow_account
    }

    pub fn is_chain_supported(&self, chain: ChainId) -> bool {
        self.supported_chains.contains(&chain)
    }

    pub fn total_locked(&self) -> Decimal {
        self.total_locked
    }

    pub fn message(&self, id: &str) -> Option<&BridgeMessage> {
        self.messages.get(id)
    }

    /// Escrow `amount` from `caller` and record a `Locked` message bound
    /// for `destination_chain`. Returns the event to hand to the transport.
    pub fn send(
        &mut self,
        token: &mut ShareToken,
        caller: &str,
        destination_chain: ChainId,
        receiver: &str,
        amount: Decimal,
    ) -> Result<OutboundTransfer, BridgeError> {
        if !self.supported_chains.contains(&destination_chain) {
            return Err(BridgeError::DestinationChainNotSupported(destination_chain));
        }
        if amount <= Decimal::ZERO {
            return Err(BridgeError::ZeroAmount);
        }
        // transfer_from validates allowance then balance; failure leaves
        // both ledgers untouched
        token.transfer_from(&self.escrow_account, caller, &self.escrow_account, amount)?;

        let id = self.derive_message_id(caller, destination_chain, amount);
        let now = Utc::now();
        self.messages.insert(
            id.clone(),
            BridgeMessage {
                id: id.clone(),
                source_chain: self.chain,
                destination_chain,
                sender: caller.to_string(),
                receiver: receiver.to_string(),
                amount,
                status: MessageStatus::Locked,
                created_at: now,
                updated_at: now,
            },
        );
        self.total_locked += amount;
        self.nonce += 1;

        info!(
            message_id = %id,
            %caller,
            destination = destination_chain,
            %receiver,
            %amount,
            total_locked = %self.total_locked,
            "tokens locked"
        );
        Ok(OutboundTransfer {
            message_id: id,
            destination_chain,
            receiver: receiver.to_string(),
            amount,
        })
    }

    /// Inbound delivery from the transport. Idempotent: the first call for
    /// a message id mints; any redelivery fails with `AlreadyProcessed`
    /// without minting again.
    pub fn deliver(
        &mut self,
        token: &mut ShareToken,
        message_id: &str,
        source_chain: ChainId,
        receiver: &str,
        amount: Decimal,
    ) -> Result<(), BridgeError> {
        if amount <= Decimal::ZERO {
            return Err(BridgeError::ZeroAmount);
        }
        if self.messages.contains_key(message_id) {
            warn!(%message_id, "duplicate delivery rejected");
            return Err(BridgeError::AlreadyProcessed(message_id.to_string()));
        }

        token.mint(&self.owner, receiver, amount)?;
        let now = Utc::now();
        self.messages.insert(
            message_id.to_string(),
            BridgeMessage {
                id: message_id.to_string(),
                source_chain,
                destination_chain: self.chain,
                sender: String::new(),
                receiver: receiver.to_string(),
                amount,
                status: MessageStatus::Minted,
                created_at: now,
                updated_at: now,
            },
        );
        info!(%message_id, source = source_chain, %receiver, %amount, "tokens minted");
        Ok(())
    }

    /// Operator acknowledgement that a delivery went wrong. Transitions any
    /// non-terminal message to `Failed` so it can be retried later;
    /// delivery is never silently dropped.
    pub fn mark_failed(&mut self, caller: &str, message_id: &str) -> Result<(), BridgeError> {
        self.require_owner(caller)?;
        let message = self
            .messages
            .get_mut(message_id)
            .ok_or_else(|| BridgeError::UnknownMessage(message_id.to_string()))?;
        if message.status == MessageStatus::Minted {
            return Err(BridgeError::AlreadyProcessed(message_id.to_string()));
        }
        message.status = MessageStatus::Failed;
        message.updated_at = Utc::now();
        warn!(%message_id, "message marked failed");
        Ok(())
    }

    /// Operator retry of a failed message: mints to `receiver` and moves
    /// the message to `Minted`. Requires current state `Failed`.
    pub fn retry_failed(
        &mut self,
        token: &mut ShareToken,
        caller: &str,
        message_id: &str,
        receiver: &str,
    ) -> Result<(), BridgeError> {
        self.require_owner(caller)?;
        let amount = {
            let message = self
                .messages
                .get(message_id)
                .ok_or_else(|| BridgeError::UnknownMessage(message_id.to_string()))?;
            if message.status != MessageStatus::Failed {
                return Err(BridgeError::NotFailed(message_id.to_string()));
            }
            message.amount
        };

        token.mint(&self.owner, receiver, amount)?;
        if let Some(message) = self.messages.get_mut(message_id) {
            message.status = MessageStatus::Minted;
            message.receiver = receiver.to_string();
            message.updated_at = Utc::now();
        }
        info!(%message_id, %receiver, %amount, "failed message retried");
        Ok(())
    }

    /// Toggle support for a destination chain. Owner-only.
    pub fn set_supported_chain(
        &mut self,
        caller: &str,
        chain: ChainId,
        enabled: bool,
    ) -> Result<(), BridgeError> {
        self.require_owner(caller)?;
        if enabled {
            self.supported_chains.insert(chain);
        } else {
            self.supported_chains.remove(&chain);
        }
        info!(chain, enabled, "chain support updated");
        Ok(())
    }

    /// Release escrowed tokens to `to`. Owner-only escape valve, and the
    /// only path that decrements the locked pool.
    pub fn emergency_withdraw(
        &mut self,
        token: &mut ShareToken,
        caller: &str,
        amount: Decimal,
        to: &str,
    ) -> Result<(), BridgeError> {
        self.require_owner(caller)?;
        if amount <= Decimal::ZERO {
            return Err(BridgeError::ZeroAmount);
        }
        token.transfer(&self.escrow_account, to, amount)?;
        self.total_locked -= amount;
        warn!(%amount, %to, total_locked = %self.total_locked, "emergency withdrawal");
        Ok(())
    }

    /// Message ids must never collide for distinct logical transfers, so
    /// the per-endpoint nonce goes into the hash alongside the transfer
    /// parameters.
    fn derive_message_id(&self, sender: &str, destination: ChainId, amount: Decimal) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.chain.to_be_bytes());
        hasher.update(sender.as_bytes());
        hasher.update(self.nonce.to_be_bytes());
        hasher.update(destination.to_be_bytes());
        hasher.update(to_wad(amount).to_be_bytes());
        hex::encode(hasher.finalize())
    }

    fn require_owner(&self, caller: &str) -> Result<(), BridgeError> {
        if caller != self.owner {
            return Err(BridgeError::Unauthorized(caller.to_string()));
        }
        Ok(())
    }
}
