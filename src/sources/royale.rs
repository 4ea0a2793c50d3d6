//! RoyaleAPI battle-log integration.
//!
//! Base URL: https://proxy.royaleapi.dev/v1 (official API proxy)
//! Endpoint: `GET /players/{tag}/battlelog` with the tag URL-encoded
//! (`#` becomes `%23`).
//! Auth: `Authorization: Bearer {token}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::debug;

use super::MatchSource;
use crate::types::Match;

const SOURCE_NAME: &str = "royaleapi";

/// Battle-log client for a single player.
pub struct RoyaleClient {
    http: Client,
    base_url: String,
    player_tag: String,
    token: SecretString,
}

impl RoyaleClient {
    pub fn new(
        base_url: &str,
        player_tag: &str,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("DECKWATCH/0.1.0")
            .build()
            .context("Failed to build HTTP client for RoyaleAPI")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            player_tag: player_tag.to_string(),
            token,
        })
    }

    /// Full battle-log URL for the configured player.
    pub fn battlelog_url(&self) -> String {
        format!(
            "{}/players/{}/battlelog",
            self.base_url,
            urlencoding::encode(&self.player_tag)
        )
    }
}

#[async_trait]
impl MatchSource for RoyaleClient {
    async fn fetch_matches(&self) -> Result<Vec<Match>> {
        let url = self.battlelog_url();
        debug!(url = %url, "Fetching battle log");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .context("RoyaleAPI request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("RoyaleAPI error {status}: {body}");
        }

        let matches: Vec<Match> = resp
            .json()
            .await
            .context("Failed to parse RoyaleAPI battle log")?;

        debug!(count = matches.len(), "Fetched battle log");
        Ok(matches)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
