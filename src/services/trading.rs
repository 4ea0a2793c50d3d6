//! Paper-trading service client.
//!
//! - `POST {base}/player` `{"playerId": ...}`: 400 means the player
//!   already exists.
//! - `POST {base}/trade` with a `TradeRequest` body.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::TradingService;
use crate::types::{AccountStatus, TradeRequest};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePlayerRequest<'a> {
    player_id: &'a str,
}

pub struct TradingClient {
    http: Client,
    base_url: String,
}

impl TradingClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for trading service")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TradingService for TradingClient {
    async fn create_player(&self, player_id: &str) -> Result<AccountStatus> {
        let url = format!("{}/player", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&CreatePlayerRequest { player_id })
            .send()
            .await
            .context("Create-player request failed")?;

        let status = resp.status();
        if status == StatusCode::BAD_REQUEST {
            debug!(player_id, "Player already exists");
            return Ok(AccountStatus::AlreadyExists);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Trading API error {status}: {body}");
        }

        Ok(AccountStatus::Created)
    }

    async fn submit_trade(&self, trade: &TradeRequest) -> Result<()> {
        let url = format!("{}/trade", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(trade)
            .send()
            .await
            .context("Trade request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Trading API error {status}: {body}");
        }

        Ok(())
    }
}
