//! Trade dispatcher.
//!
//! Executes one decoded instruction against the trading service for the
//! tracked player: ensure the account exists, then submit the order.
//! A failed account call is logged and the order is still submitted; only
//! a failed order submission fails the dispatch.

use chrono::{Local, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::services::TradingService;
use crate::types::{AccountStatus, DispatchReceipt, PipelineError, TradeInstruction, TradeRequest};

pub struct TradeDispatcher {
    trading: Arc<dyn TradingService>,
    player_id: String,
    dry_run: bool,
}

impl TradeDispatcher {
    pub fn new(trading: Arc<dyn TradingService>, player_id: &str, dry_run: bool) -> Self {
        Self {
            trading,
            player_id: player_id.to_string(),
            dry_run,
        }
    }

    /// Ensure the account, then submit the order.
    pub async fn dispatch(
        &self,
        instruction: &TradeInstruction,
    ) -> Result<DispatchReceipt, PipelineError> {
        let request = TradeRequest::new(&self.player_id, instruction, Local::now());

        if self.dry_run {
            info!(
                player_id = %self.player_id,
                symbol = %request.symbol,
                side = %request.side,
                quantity = request.quantity,
                t = request.t,
                "[DRY RUN] Would place trade"
            );
            return Ok(DispatchReceipt {
                order_id: format!("dry-run-{}", uuid::Uuid::new_v4()),
                account: AccountStatus::Unconfirmed,
                request,
                dry_run: true,
                timestamp: Utc::now(),
            });
        }

        let account = self.ensure_account().await;

        self.trading
            .submit_trade(&request)
            .await
            .map_err(|e| PipelineError::Dispatch {
                step: "submit-trade".to_string(),
                message: format!("{e:#}"),
            })?;

        info!(
            player_id = %self.player_id,
            symbol = %request.symbol,
            side = %request.side,
            quantity = request.quantity,
            "Trade submitted"
        );

        Ok(DispatchReceipt {
            order_id: uuid::Uuid::new_v4().to_string(),
            account,
            request,
            dry_run: false,
            timestamp: Utc::now(),
        })
    }

    /// Idempotent account creation. Never fails the dispatch.
    async fn ensure_account(&self) -> AccountStatus {
        match self.trading.create_player(&self.player_id).await {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    player_id = %self.player_id,
                    error = %format!("{e:#}"),
                    "Create-player failed, submitting trade anyway"
                );
                AccountStatus::Unconfirmed
            }
        }
    }
}
