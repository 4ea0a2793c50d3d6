//! Poll-loop pipeline.
//!
//! One `run_iteration` is one tick: fetch the battle log, then take each
//! battle in source order through filter → decode → dispatch. Every
//! battle ends in a `MatchOutcome`; a failure on one battle is logged and
//! never stops the ones after it. Only a failed fetch fails the tick, and
//! it leaves the ledger untouched.
//!
//! Until the ledger has been seeded (one fetch whose battles are all
//! marked as handled), ticks retry seeding and process nothing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::dispatcher::TradeDispatcher;
use super::filter::{MatchFilter, Screening, SkipReason};
use super::ledger::DedupLedger;
use crate::services::DeckDecoder;
use crate::sources::MatchSource;
use crate::types::{
    DispatchReceipt, LedgerSeed, Match, MatchIdentity, OutcomePolicy, PipelineError,
    TradeInstruction,
};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to a single battle.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Forwarded {
        identity: MatchIdentity,
        instruction: TradeInstruction,
        receipt: DispatchReceipt,
    },
    Skipped(SkipReason),
    Anomaly {
        error: PipelineError,
    },
    DecodeFailed {
        identity: MatchIdentity,
        error: PipelineError,
    },
    DispatchFailed {
        identity: MatchIdentity,
        instruction: TradeInstruction,
        error: PipelineError,
    },
}

impl MatchOutcome {
    pub fn is_forwarded(&self) -> bool {
        matches!(self, Self::Forwarded { .. })
    }

    pub fn identity(&self) -> Option<&MatchIdentity> {
        match self {
            Self::Forwarded { identity, .. }
            | Self::DecodeFailed { identity, .. }
            | Self::DispatchFailed { identity, .. } => Some(identity),
            Self::Skipped(_) | Self::Anomaly { .. } => None,
        }
    }
}

/// Summary of one tick.
#[derive(Debug, Clone, Default)]
pub struct IterationReport {
    pub iteration: u64,
    pub fetched: usize,
    /// Set when this tick seeded the ledger instead of processing.
    pub seeded: Option<usize>,
    pub outcomes: Vec<MatchOutcome>,
    pub ledger_size: usize,
}

impl IterationReport {
    pub fn forwarded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_forwarded()).count()
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, MatchOutcome::Skipped(_)))
    }

    pub fn anomalies(&self) -> usize {
        self.count(|o| matches!(o, MatchOutcome::Anomaly { .. }))
    }

    pub fn decode_failures(&self) -> usize {
        self.count(|o| matches!(o, MatchOutcome::DecodeFailed { .. }))
    }

    pub fn dispatch_failures(&self) -> usize {
        self.count(|o| matches!(o, MatchOutcome::DispatchFailed { .. }))
    }

    /// Nothing but skips: no seeding, no forwards, no failures.
    pub fn is_quiet(&self) -> bool {
        self.seeded.is_none() && self.skipped() == self.outcomes.len()
    }

    fn count(&self, pred: impl Fn(&MatchOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

impl fmt::Display for IterationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.seeded {
            return write!(f, "Iteration #{}: seeded ledger with {n} battles", self.iteration);
        }
        write!(
            f,
            "Iteration #{}: fetched={} forwarded={} skipped={} anomalies={} decode_failed={} dispatch_failed={} ledger={}",
            self.iteration,
            self.fetched,
            self.forwarded(),
            self.skipped(),
            self.anomalies(),
            self.decode_failures(),
            self.dispatch_failures(),
            self.ledger_size,
        )
    }
}

/// Running totals since startup.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub started_at: DateTime<Utc>,
    pub last_iteration_at: Option<DateTime<Utc>>,
    pub iterations: u64,
    pub fetch_failures: u64,
    pub matches_fetched: u64,
    pub forwarded: u64,
    pub skipped: u64,
    pub anomalies: u64,
    pub decode_failures: u64,
    pub dispatch_failures: u64,
    pub seeded: bool,
    pub outcome_policy: OutcomePolicy,
}

impl PipelineStats {
    pub fn new(outcome_policy: OutcomePolicy) -> Self {
        Self {
            started_at: Utc::now(),
            last_iteration_at: None,
            iterations: 0,
            fetch_failures: 0,
            matches_fetched: 0,
            forwarded: 0,
            skipped: 0,
            anomalies: 0,
            decode_failures: 0,
            dispatch_failures: 0,
            seeded: false,
            outcome_policy,
        }
    }

    fn record(&mut self, outcome: &MatchOutcome) {
        match outcome {
            MatchOutcome::Forwarded { .. } => self.forwarded += 1,
            MatchOutcome::Skipped(_) => self.skipped += 1,
            MatchOutcome::Anomaly { .. } => self.anomalies += 1,
            MatchOutcome::DecodeFailed { .. } => self.decode_failures += 1,
            MatchOutcome::DispatchFailed { .. } => self.dispatch_failures += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    source: Arc<dyn MatchSource>,
    decoder: Arc<dyn DeckDecoder>,
    dispatcher: TradeDispatcher,
    filter: MatchFilter,
    ledger: Box<dyn DedupLedger>,
    seed_mode: LedgerSeed,
    seeded: bool,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn MatchSource>,
        decoder: Arc<dyn DeckDecoder>,
        dispatcher: TradeDispatcher,
        filter: MatchFilter,
        ledger: Box<dyn DedupLedger>,
        seed_mode: LedgerSeed,
    ) -> Self {
        let stats = PipelineStats::new(filter.policy());
        Self {
            source,
            decoder,
            dispatcher,
            filter,
            ledger,
            seed_mode,
            seeded: false,
            stats,
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    pub fn ledger_snapshot(&self) -> Vec<MatchIdentity> {
        self.ledger.snapshot()
    }

    /// Mark every battle currently visible as handled.
    ///
    /// In `LedgerSeed::Empty` mode nothing is fetched and the ledger stays
    /// empty, so the visible history is processed on the next tick.
    pub async fn seed(&mut self) -> Result<usize, PipelineError> {
        if self.seeded {
            return Ok(0);
        }

        if self.seed_mode == LedgerSeed::Empty {
            warn!("Ledger seeding disabled: visible battle history will be reprocessed");
            self.mark_seeded();
            return Ok(0);
        }

        let matches = self.fetch().await?;
        let mut added = 0;
        for m in &matches {
            if let Some(id) = MatchIdentity::of(m) {
                if self.ledger.mark_seen(id) {
                    added += 1;
                }
            }
        }

        info!(count = added, "Found pre-existing battles in history");
        self.mark_seeded();
        Ok(added)
    }

    /// One tick. Seeds instead of processing if seeding has not succeeded yet.
    pub async fn run_iteration(&mut self) -> Result<IterationReport, PipelineError> {
        self.stats.iterations += 1;
        self.stats.last_iteration_at = Some(Utc::now());

        let mut report = IterationReport {
            iteration: self.stats.iterations,
            ..Default::default()
        };

        if !self.seeded {
            report.seeded = Some(self.seed().await?);
            report.ledger_size = self.ledger.len();
            return Ok(report);
        }

        let matches = self.fetch().await?;
        report.fetched = matches.len();

        for m in &matches {
            let outcome = self.process_match(m).await;
            report.outcomes.push(outcome);
        }

        report.ledger_size = self.ledger.len();
        Ok(report)
    }

    /// Take one battle through filter → decode → dispatch.
    pub async fn process_match(&mut self, m: &Match) -> MatchOutcome {
        let outcome = self.process_inner(m).await;
        self.stats.record(&outcome);
        outcome
    }

    async fn process_inner(&mut self, m: &Match) -> MatchOutcome {
        let identity = match self.filter.screen(m, self.ledger.as_mut()) {
            Screening::Admitted(id) => id,
            Screening::Skipped(reason) => {
                debug!(battle_time = %m.battle_time, reason = %reason, "Battle skipped");
                return MatchOutcome::Skipped(reason);
            }
            Screening::Anomaly(reason) => {
                let error = PipelineError::ShapeAnomaly(reason);
                warn!(
                    battle_time = %m.battle_time,
                    groups = m.team.len(),
                    error = %error,
                    "Unexpected battle shape"
                );
                return MatchOutcome::Anomaly { error };
            }
        };

        let cards: Vec<String> = m
            .self_group()
            .map(|p| p.cards.iter().map(|c| format!("{} ({})", c.name, c.level)).collect())
            .unwrap_or_default();
        info!(
            identity = %identity,
            battle_time = %m.battle_time,
            battle_type = %m.kind,
            opponent = %m.opponent_name(),
            deck = %cards.join(", "),
            "Processing deck"
        );

        let instruction = match self.decoder.decode(&m.self_card_ids()).await {
            Ok(instruction) => instruction,
            Err(e) => {
                let error = PipelineError::Decode(format!("{e:#}"));
                warn!(identity = %identity, error = %error, "Deck decode failed, battle dropped");
                return MatchOutcome::DecodeFailed { identity, error };
            }
        };
        info!(identity = %identity, instruction = %instruction, "Decoded trade action");

        match self.dispatcher.dispatch(&instruction).await {
            Ok(receipt) => MatchOutcome::Forwarded {
                identity,
                instruction,
                receipt,
            },
            Err(error) => {
                warn!(identity = %identity, error = %error, "Trade dispatch failed, battle dropped");
                MatchOutcome::DispatchFailed {
                    identity,
                    instruction,
                    error,
                }
            }
        }
    }

    async fn fetch(&mut self) -> Result<Vec<Match>, PipelineError> {
        match self.source.fetch_matches().await {
            Ok(matches) => {
                self.stats.matches_fetched += matches.len() as u64;
                Ok(matches)
            }
            Err(e) => {
                self.stats.fetch_failures += 1;
                Err(PipelineError::Fetch(format!("{e:#}")))
            }
        }
    }

    fn mark_seeded(&mut self) {
        self.seeded = true;
        self.stats.seeded = true;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
