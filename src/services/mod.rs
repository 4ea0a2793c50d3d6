//! Downstream services.
//!
//! Two collaborators sit behind traits so the pipeline can run against
//! mocks:
//! - `DeckDecoder`: turns a deck's card ids into a trade instruction
//! - `TradingService`: player accounts and order submission

pub mod decoder;
pub mod trading;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{AccountStatus, TradeInstruction, TradeRequest};

/// Deck → trade instruction translation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeckDecoder: Send + Sync {
    /// Decode the ordered card identifiers of one deck.
    async fn decode(&self, card_ids: &[u64]) -> Result<TradeInstruction>;
}

/// The paper-trading backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradingService: Send + Sync {
    /// Register the player. Must report `AlreadyExists` rather than fail
    /// when the account is already there.
    async fn create_player(&self, player_id: &str) -> Result<AccountStatus>;

    /// Record one order.
    async fn submit_trade(&self, trade: &TradeRequest) -> Result<()>;
}
