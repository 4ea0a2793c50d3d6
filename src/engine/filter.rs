//! Match filter.
//!
//! Decides, per battle, whether it goes downstream. Checks run in a fixed
//! order and the ledger is touched only once every other check passed:
//!
//! 1. two team groups (2v2) → skipped
//! 2. anything other than one team group, or no opponent → anomaly
//! 3. trophy delta does not match the outcome policy → skipped
//! 4. identity already in the ledger → skipped; otherwise recorded now,
//!    before any downstream call

use serde::Serialize;
use std::fmt;

use super::ledger::DedupLedger;
use crate::types::{Match, MatchIdentity, OutcomePolicy};

/// Why an otherwise well-formed battle was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    TeamMode,
    PolicyMismatch,
    AlreadySeen,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TeamMode => write!(f, "2v2 battle"),
            Self::PolicyMismatch => write!(f, "outcome does not match policy"),
            Self::AlreadySeen => write!(f, "already processed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
    /// New qualifying battle, already recorded in the ledger.
    Admitted(MatchIdentity),
    Skipped(SkipReason),
    /// Unexpected group layout. Not recorded.
    Anomaly(String),
}

#[derive(Debug, Clone, Copy)]
pub struct MatchFilter {
    policy: OutcomePolicy,
}

impl MatchFilter {
    pub fn new(policy: OutcomePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> OutcomePolicy {
        self.policy
    }

    /// Run all checks and, when the battle is admitted, record it.
    pub fn screen(&self, m: &Match, ledger: &mut dyn DedupLedger) -> Screening {
        match m.team.len() {
            2 => return Screening::Skipped(SkipReason::TeamMode),
            1 => {}
            n => return Screening::Anomaly(format!("unexpected team size {n}")),
        }

        let me = &m.team[0];
        if !self.policy.qualifies(me.trophy_change) {
            return Screening::Skipped(SkipReason::PolicyMismatch);
        }

        let Some(id) = MatchIdentity::of(m) else {
            return Screening::Anomaly("no opponent group".to_string());
        };

        if ledger.mark_seen(id.clone()) {
            Screening::Admitted(id)
        } else {
            Screening::Skipped(SkipReason::AlreadySeen)
        }
    }
}
