//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The stats-provider token is referenced by env-var name in the config
//! and resolved at startup via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

use crate::types::{LedgerSeed, OutcomePolicy};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub player: PlayerConfig,
    pub source: SourceConfig,
    pub decoder: DecoderConfig,
    pub trading: TradingConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlayerConfig {
    /// Player tag, e.g. `#2YLCP0R8`. The leading `#` is optional.
    pub tag: String,
}

impl PlayerConfig {
    /// Tag in the provider's canonical `#XXXX` form.
    pub fn battle_tag(&self) -> String {
        format!("#{}", self.trading_id())
    }

    /// Tag without `#`, used as the trading-service player id.
    pub fn trading_id(&self) -> &str {
        self.tag.trim().trim_start_matches('#')
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Read battles from this JSON file instead of the API.
    #[serde(default)]
    pub replay_file: Option<String>,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DecoderConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TradingConfig {
    pub base_url: String,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub outcome_policy: OutcomePolicy,
    #[serde(default)]
    pub ledger_seed: LedgerSeed,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            outcome_policy: OutcomePolicy::default(),
            ledger_seed: LedgerSeed::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_dashboard_port(),
        }
    }
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

fn default_http_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    5
}

fn default_dashboard_port() -> u16 {
    8010
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        if config.pipeline.poll_interval_secs == 0 {
            anyhow::bail!("pipeline.poll_interval_secs must be at least 1");
        }
        if config.player.trading_id().is_empty() {
            anyhow::bail!("player.tag must not be empty");
        }
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Bearer token for the stats provider.
    pub fn api_token(&self) -> Result<SecretString> {
        Self::resolve_env(&self.source.api_key_env).map(SecretString::new)
    }
}
