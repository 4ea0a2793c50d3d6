//! File-backed match source.
//!
//! Reads a saved battle-log response (a JSON array, same shape as the
//! HTTP endpoint) on every fetch, so the file can be edited while the
//! process runs to simulate new battles appearing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use super::MatchSource;
use crate::types::Match;

pub struct ReplaySource {
    path: PathBuf,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MatchSource for ReplaySource {
    async fn fetch_matches(&self) -> Result<Vec<Match>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read replay file {}", self.path.display()))?;

        let matches: Vec<Match> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse replay file {}", self.path.display()))?;

        debug!(path = %self.path.display(), count = matches.len(), "Replayed battle log");
        Ok(matches)
    }

    fn name(&self) -> &str {
        "replay"
    }
}
