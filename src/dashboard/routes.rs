//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`
//! and only ever holds copies published by the poll loop.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::pipeline::{IterationReport, MatchOutcome, PipelineStats};
use crate::types::MatchIdentity;

/// Events kept for `/api/events`.
const MAX_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct DashboardState {
    pub stats: RwLock<PipelineStats>,
    pub ledger: RwLock<Vec<MatchIdentity>>,
    pub events: RwLock<Vec<EventLogEntry>>,
}

impl DashboardState {
    pub fn new(stats: PipelineStats) -> Self {
        Self {
            stats: RwLock::new(stats),
            ledger: RwLock::new(Vec::new()),
            events: RwLock::new(Vec::new()),
        }
    }

    /// Replace the published view with fresh copies from the poll loop.
    pub async fn publish(
        &self,
        stats: PipelineStats,
        ledger: Vec<MatchIdentity>,
        report: Option<&IterationReport>,
    ) {
        *self.stats.write().await = stats;
        *self.ledger.write().await = ledger;

        if let Some(report) = report {
            let mut events = self.events.write().await;
            events.extend(report.outcomes.iter().filter_map(EventLogEntry::from_outcome));
            let excess = events.len().saturating_sub(MAX_EVENTS);
            events.drain(..excess);
        }
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub stats: PipelineStats,
    pub ledger_size: usize,
    pub uptime_secs: i64,
}

/// A battle that reached (or failed on the way to) the trading service,
/// or that looked malformed. Plain skips are not logged here.
#[derive(Debug, Clone, Serialize)]
pub struct EventLogEntry {
    pub timestamp: String,
    pub kind: String,
    pub identity: Option<String>,
    pub detail: String,
}

impl EventLogEntry {
    fn from_outcome(outcome: &MatchOutcome) -> Option<Self> {
        let (kind, detail) = match outcome {
            MatchOutcome::Forwarded { instruction, receipt, .. } => (
                "forwarded",
                format!("{instruction} (order {})", receipt.order_id),
            ),
            MatchOutcome::DecodeFailed { error, .. } => ("decode_failed", error.to_string()),
            MatchOutcome::DispatchFailed { error, .. } => ("dispatch_failed", error.to_string()),
            MatchOutcome::Anomaly { error } => ("anomaly", error.to_string()),
            MatchOutcome::Skipped(_) => return None,
        };

        Some(Self {
            timestamp: Utc::now().to_rfc3339(),
            kind: kind.to_string(),
            identity: outcome.identity().map(|id| id.to_string()),
            detail,
        })
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub type AppState = Arc<DashboardState>;

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let stats = state.stats.read().await.clone();
    let ledger_size = state.ledger.read().await.len();
    let uptime_secs = (Utc::now() - stats.started_at).num_seconds();

    Json(StatusResponse {
        stats,
        ledger_size,
        uptime_secs,
    })
}

/// GET /api/ledger
pub async fn get_ledger(State(state): State<AppState>) -> Json<Vec<MatchIdentity>> {
    Json(state.ledger.read().await.clone())
}

/// GET /api/events
pub async fn get_events(State(state): State<AppState>) -> Json<Vec<EventLogEntry>> {
    Json(state.events.read().await.clone())
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
