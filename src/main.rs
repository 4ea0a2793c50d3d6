//! DECKWATCH: battle log to stock trades
//!
//! Entry point. Loads configuration, initialises structured logging,
//! seeds the dedup ledger from the visible battle history, and runs the
//! fetch→filter→decode→trade loop until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use deckwatch::config::AppConfig;
use deckwatch::dashboard::{self, routes::DashboardState};
use deckwatch::engine::dispatcher::TradeDispatcher;
use deckwatch::engine::filter::MatchFilter;
use deckwatch::engine::ledger::InMemoryLedger;
use deckwatch::engine::pipeline::{IterationReport, Pipeline};
use deckwatch::services::decoder::DecoderClient;
use deckwatch::services::trading::TradingClient;
use deckwatch::sources::replay::ReplaySource;
use deckwatch::sources::royale::RoyaleClient;
use deckwatch::sources::MatchSource;

/// Config path when `DECKWATCH_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("DECKWATCH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    info!(
        player = %cfg.player.battle_tag(),
        poll_interval_secs = cfg.pipeline.poll_interval_secs,
        outcome_policy = %cfg.pipeline.outcome_policy,
        ledger_seed = ?cfg.pipeline.ledger_seed,
        dry_run = cfg.trading.dry_run,
        "DECKWATCH starting up"
    );

    // -- Initialise components -------------------------------------------

    let timeout = Duration::from_secs(cfg.source.http_timeout_secs);

    let source: Arc<dyn MatchSource> = match &cfg.source.replay_file {
        Some(path) => {
            warn!(path = %path, "Reading battles from replay file instead of the API");
            Arc::new(ReplaySource::new(path))
        }
        None => Arc::new(RoyaleClient::new(
            &cfg.source.base_url,
            &cfg.player.battle_tag(),
            cfg.api_token()?,
            timeout,
        )?),
    };
    info!(source = source.name(), "Match source ready");

    let decoder = Arc::new(DecoderClient::new(&cfg.decoder.url, timeout)?);
    let trading = Arc::new(TradingClient::new(&cfg.trading.base_url, timeout)?);
    let dispatcher = TradeDispatcher::new(trading, cfg.player.trading_id(), cfg.trading.dry_run);

    let mut pipeline = Pipeline::new(
        source,
        decoder,
        dispatcher,
        MatchFilter::new(cfg.pipeline.outcome_policy),
        Box::new(InMemoryLedger::new()),
        cfg.pipeline.ledger_seed,
    );

    let dashboard_state = if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(pipeline.stats().clone()));
        dashboard::spawn_dashboard(state.clone(), cfg.dashboard.port);
        Some(state)
    } else {
        None
    };

    // -- Seed ledger -----------------------------------------------------

    info!("Service about to start");
    match pipeline.seed().await {
        Ok(count) => info!(count, "Ledger seeded"),
        Err(e) => warn!(error = %e, "Seeding failed, retrying on the next tick"),
    }
    if let Some(state) = &dashboard_state {
        state
            .publish(pipeline.stats().clone(), pipeline.ledger_snapshot(), None)
            .await;
    }

    // -- Main loop -------------------------------------------------------

    // Iterations run inline, so a slow one swallows the ticks it overlaps
    // instead of queueing them.
    let mut interval = tokio::time::interval(Duration::from_secs(cfg.pipeline.poll_interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.pipeline.poll_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = match pipeline.run_iteration().await {
                    Ok(report) => {
                        log_iteration_report(&report);
                        Some(report)
                    }
                    Err(e) => {
                        warn!(error = %e, "Iteration failed, continuing to next tick");
                        None
                    }
                };

                if let Some(state) = &dashboard_state {
                    state
                        .publish(pipeline.stats().clone(), pipeline.ledger_snapshot(), report.as_ref())
                        .await;
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    let stats = pipeline.stats();
    info!(
        iterations = stats.iterations,
        forwarded = stats.forwarded,
        decode_failures = stats.decode_failures,
        dispatch_failures = stats.dispatch_failures,
        fetch_failures = stats.fetch_failures,
        ledger = pipeline.ledger_len(),
        "DECKWATCH shut down cleanly."
    );

    Ok(())
}

/// Log a one-line iteration summary. Quiet ticks go to debug.
fn log_iteration_report(report: &IterationReport) {
    if report.is_quiet() {
        debug!("{report}");
    } else {
        info!("{report}");
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("deckwatch=info"));

    let json_logging = std::env::var("DECKWATCH_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
