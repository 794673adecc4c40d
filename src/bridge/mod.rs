//! Lock-and-mint cross-chain bridge.
//!
//! Each chain runs its own `BridgeRouter` over its own token ledger; the
//! two endpoints share nothing but the message id. The transport between
//! them is external and at-least-once, so every inbound delivery is treated
//! as possibly duplicated and possibly never arriving.

mod router;

pub use router::BridgeRouter;

use crate::token::TokenError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Chain selector, matching the u64 selectors used by cross-chain routers.
pub type ChainId = u64;

/// Default testnet selectors.
pub const SEPOLIA_CHAIN_SELECTOR: ChainId = 16015286601757825753;
pub const FUJI_CHAIN_SELECTOR: ChainId = 14767482510784806043;

/// Errors for bridge operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("destination chain {0} is not supported")]
    DestinationChainNotSupported(ChainId),
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error("message {0} already processed")]
    AlreadyProcessed(String),
    #[error("message {0} is unknown to this endpoint")]
    UnknownMessage(String),
    #[error("message {0} is not marked failed")]
    NotFailed(String),
    #[error("caller {0} is not the bridge owner")]
    Unauthorized(String),
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Lifecycle of one side of a bridge message.
///
/// A message a chain has never heard of is simply absent from its map:
/// "in flight" is the absence of a record, not a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    /// Tokens escrowed on the source chain.
    Locked,
    /// Delivered and minted on the destination. Terminal.
    Minted,
    /// Delivery attempted and explicitly marked failed; an operator retry
    /// may still move it to `Minted`.
    Failed,
}

/// One endpoint's record of a logical transfer. The source's lock record
/// and the destination's delivery record carry the same id but are two
/// independent pieces of state.
#[derive(Debug, Clone)]
pub struct BridgeMessage {
    pub id: String,
    pub source_chain: ChainId,
    pub destination_chain: ChainId,
    pub sender: String,
    pub receiver: String,
    pub amount: Decimal,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outbound event handed to the external transport on `send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundTransfer {
    pub message_id: String,
    pub destination_chain: ChainId,
    pub receiver: String,
    pub amount: Decimal,
}
