//! Deck decoding service client.
//!
//! `POST {url}` with `{"deck": ["26000010", ...]}` (ids as decimal
//! strings, deck order preserved). Answers
//! `{"stock": {"buy": bool, "ticker": string, "shares": integer}}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::DeckDecoder;
use crate::types::{Side, TradeInstruction};

#[derive(Debug, Serialize)]
struct DecodeRequest {
    deck: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DecodeResponse {
    stock: DecodedStock,
}

#[derive(Debug, Deserialize)]
struct DecodedStock {
    buy: bool,
    ticker: String,
    shares: u64,
}

pub struct DecoderClient {
    http: Client,
    url: String,
}

impl DecoderClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for decoder")?;

        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl DeckDecoder for DecoderClient {
    async fn decode(&self, card_ids: &[u64]) -> Result<TradeInstruction> {
        let body = DecodeRequest {
            deck: card_ids.iter().map(|id| id.to_string()).collect(),
        };
        debug!(cards = body.deck.len(), "Decoding deck");

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .context("Decoder request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Decoder error {status}: {body}");
        }

        let decoded: DecodeResponse = resp
            .json()
            .await
            .context("Failed to parse decoder response")?;

        let stock = decoded.stock;
        if stock.ticker.trim().is_empty() {
            anyhow::bail!("Decoder returned an empty ticker");
        }

        Ok(TradeInstruction {
            ticker: stock.ticker,
            side: Side::from_buy_flag(stock.buy),
            shares: stock.shares,
        })
    }
}
