//! Shared types for the DECKWATCH pipeline.
//!
//! The battle-log shapes mirror the fields we read from the stats
//! provider; everything else in the record is ignored on deserialization.
//! Trade-side types describe the decoded instruction and the payloads
//! sent to the trading service.

use chrono::{DateTime, Local, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Battle log
// ---------------------------------------------------------------------------

/// One completed battle as returned by the battle-log endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Provider timestamp, e.g. `20250301T181512.000Z`. Kept verbatim
    /// because it is part of the dedup identity.
    pub battle_time: String,
    /// Battle type ("PvP", "pathOfLegend", "clanMate2v2", ...).
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Groups on the tracked player's side. One for 1v1, two for 2v2.
    #[serde(default)]
    pub team: Vec<Participant>,
    #[serde(default)]
    pub opponent: Vec<Participant>,
}

/// A participant group inside a battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub tag: String,
    #[serde(default)]
    pub name: String,
    /// Absent for unranked modes; treated as 0 (a non-win).
    #[serde(default)]
    pub trophy_change: i64,
    /// Cards in deck order.
    #[serde(default)]
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: i64,
}

impl Match {
    /// The tracked player's group, if the battle has exactly one.
    pub fn self_group(&self) -> Option<&Participant> {
        match self.team.as_slice() {
            [me] => Some(me),
            _ => None,
        }
    }

    /// Card identifiers of the tracked player's deck, in deck order.
    pub fn self_card_ids(&self) -> Vec<u64> {
        self.self_group()
            .map(|p| p.cards.iter().map(|c| c.id).collect())
            .unwrap_or_default()
    }

    pub fn opponent_name(&self) -> &str {
        self.opponent.first().map(|o| o.name.as_str()).unwrap_or("?")
    }
}

// ---------------------------------------------------------------------------
// Match identity
// ---------------------------------------------------------------------------

/// Dedup key: `{self tag}-{battle time}-{opponent tag}`.
///
/// Only those three fields take part, so two records that differ
/// elsewhere collapse onto the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchIdentity(String);

impl MatchIdentity {
    /// Derive the identity of a battle. `None` when either side has no
    /// participant group to take a tag from.
    pub fn of(m: &Match) -> Option<Self> {
        let me = m.team.first()?;
        let them = m.opponent.first()?;
        Some(Self(format!("{}-{}-{}", me.tag, m.battle_time, them.tag)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Policy switches
// ---------------------------------------------------------------------------

/// Which battle outcome counts as a qualifying event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomePolicy {
    /// Trophy delta > 0.
    #[default]
    Wins,
    /// Trophy delta <= 0.
    Losses,
}

impl OutcomePolicy {
    pub fn qualifies(self, trophy_change: i64) -> bool {
        match self {
            Self::Wins => trophy_change > 0,
            Self::Losses => trophy_change <= 0,
        }
    }
}

impl fmt::Display for OutcomePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wins => write!(f, "wins"),
            Self::Losses => write!(f, "losses"),
        }
    }
}

/// How the dedup ledger starts out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerSeed {
    /// Mark everything visible at startup as already handled.
    #[default]
    History,
    /// Debug: start empty and reprocess the visible history.
    Empty,
}

// ---------------------------------------------------------------------------
// Trading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_buy_flag(buy: bool) -> Self {
        if buy {
            Self::Buy
        } else {
            Self::Sell
        }
    }

    /// Wire representation expected by the trading service.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded order: which ticker, which direction, how many shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeInstruction {
    pub ticker: String,
    pub side: Side,
    pub shares: u64,
}

impl fmt::Display for TradeInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} x{}", self.side, self.ticker, self.shares)
    }
}

/// Result of the idempotent "create player" call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Created,
    AlreadyExists,
    /// The call failed; the trade is submitted anyway.
    Unconfirmed,
}

/// Body of `POST {trading}/trade`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRequest {
    #[serde(rename = "playerid")]
    pub player_id: String,
    pub symbol: String,
    pub side: String,
    pub quantity: u64,
    /// Seconds since local midnight at submission time.
    #[serde(rename = "T")]
    pub t: i64,
}

impl TradeRequest {
    pub fn new(player_id: &str, instruction: &TradeInstruction, now: DateTime<Local>) -> Self {
        Self {
            player_id: player_id.to_string(),
            symbol: instruction.ticker.clone(),
            side: instruction.side.as_str().to_string(),
            quantity: instruction.shares,
            t: seconds_since_midnight(now),
        }
    }
}

/// Seconds actually elapsed since the most recent midnight in `now`'s zone.
///
/// On DST change days this differs from the wall-clock reading. Zones
/// that skip midnight itself fall back to the wall clock.
pub fn seconds_since_midnight<Tz: TimeZone>(now: DateTime<Tz>) -> i64 {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    let start = now.timezone().from_local_datetime(&midnight).earliest();
    match start {
        Some(start) => (now - start).num_seconds(),
        None => i64::from(now.num_seconds_from_midnight()),
    }
}

/// What the dispatcher did for one instruction.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReceipt {
    pub order_id: String,
    pub account: AccountStatus,
    pub request: TradeRequest,
    pub dry_run: bool,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failure taxonomy of the pipeline. None of these stop the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// Source unreachable or body malformed. The whole tick is skipped.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Unexpected participant-group layout. Match skipped, not recorded.
    #[error("Shape anomaly: {0}")]
    ShapeAnomaly(String),

    /// Decoder unreachable or answer malformed. Match already recorded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Trade submission failed. Match already recorded.
    #[error("Dispatch error ({step}): {message}")]
    Dispatch { step: String, message: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
