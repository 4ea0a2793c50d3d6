//! Match sources.
//!
//! Defines the `MatchSource` trait and provides implementations for:
//! - RoyaleAPI battle log (bearer-token authenticated HTTP)
//! - Replay: a battle-log JSON file on disk, for local debugging

pub mod replay;
pub mod royale;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Match;

/// Where the tracked player's recent battles come from.
///
/// One call is one fetch; implementations do not retry. The caller skips
/// the tick on error instead of treating it as "no new battles".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// Fetch the recent battles, newest first as the provider returns them.
    async fn fetch_matches(&self) -> Result<Vec<Match>>;

    /// Source name for logging.
    fn name(&self) -> &str;
}
