// =============================================================================
// ftmo-supervisor — risk + execution kernel entry point
// =============================================================================
//
// A thin binary: parse just enough of the CLI surface (`--config`, `--run-id`,
// `--resume`, `--clear-safe`) to exercise the service loop end-to-end, build
// the five subsystems, and run until interrupted. Full CLI argument parsing,
// credential sourcing, and a concrete broker/strategy remain a host concern
// (see §1 Non-goals / §6 External Interfaces).
// =============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ftmo_supervisor::app_state::AppState;
use ftmo_supervisor::execution::{self, DuplicateConfig, ExecutionEngine, OrderJournal, PaperBroker};
use ftmo_supervisor::monitoring::{AuditLog, LogNotifier, Monitor};
use ftmo_supervisor::risk::RiskGovernor;
use ftmo_supervisor::runtime::{
    create_run_context, AsyncService, AsyncServiceConfig, DailyMetricsTracker, DriftTracker, SafeModeLatch,
};
use ftmo_supervisor::rule_engine::engine::RuleEngine;
use ftmo_supervisor::rule_engine::state::RuleState;
use ftmo_supervisor::rule_engine::time::day_start_for;
use ftmo_supervisor::runtime_config::RuntimeConfig;

struct Args {
    config: PathBuf,
    run_id: Option<String>,
    resume: bool,
    clear_safe: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut config = None;
    let mut run_id = None;
    let mut resume = false;
    let mut clear_safe = false;

    let mut raw = std::env::args().skip(1);
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" => config = raw.next(),
            "--run-id" => run_id = raw.next(),
            "--resume" => resume = true,
            "--clear-safe" => clear_safe = true,
            other => warn!(arg = other, "ignoring unrecognised argument"),
        }
    }

    Ok(Args {
        config: config.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("runtime_config.json")),
        run_id,
        resume,
        clear_safe,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args()?;

    info!(config = %args.config.display(), "ftmo-supervisor starting");

    let config = RuntimeConfig::load(&args.config).map_err(|e| {
        error!(error = %e, "failed to load runtime config, aborting startup");
        e
    })?;

    let context = create_run_context(&args.config, "ftmo", args.run_id.clone())?;
    info!(run_id = %context.run_id, config_hash = %context.config_hash, "run context established");

    let audit_log = Arc::new(AuditLog::open(
        &config.audit_log_path,
        Some(context.run_id.clone()),
        Some(context.config_hash.clone()),
    )?);

    let notifier = Arc::new(LogNotifier::default());
    let monitor = Arc::new(Monitor::new(notifier));

    let safe_mode = Arc::new(SafeModeLatch::open(
        &config.safe_mode_path,
        true,
        Some(monitor.clone()),
        Some(audit_log.clone()),
    )?);
    if args.clear_safe {
        safe_mode.clear("operator requested")?;
        info!("safe-mode latch cleared by operator request");
    }

    let drift = Arc::new(DriftTracker::open(
        &config.drift_state_path,
        config.drift_max_age_seconds,
        Some(audit_log.clone()),
        Some(safe_mode.clone()),
    )?);

    let journal = Arc::new(OrderJournal::open(&config.journal_path)?);
    // The core ships no vendor broker; `PaperBroker` keeps this binary runnable
    // end-to-end until a host wires in a real one.
    let broker: Arc<dyn execution::Broker> = Arc::new(PaperBroker::new());
    let duplicate = DuplicateConfig {
        window: chrono::Duration::seconds(config.duplicate_window_seconds),
        block: config.duplicate_block,
    };
    let engine = Arc::new(ExecutionEngine::new(
        broker,
        journal,
        Some(audit_log.clone()),
        Some(monitor.clone()),
        None,
        duplicate,
    ));

    let governor = Arc::new(RiskGovernor::new(
        RuleEngine::new(config.rule_spec.clone()),
        Some(audit_log.clone()),
        Some(monitor.clone()),
    ));

    let metrics = Arc::new(DailyMetricsTracker::new(config.rule_spec.zone()));

    let state_snapshot_path = args.config.with_file_name("state_snapshot.json");
    let initial_state = if args.resume && state_snapshot_path.exists() {
        info!(path = %state_snapshot_path.display(), "resuming from state snapshot");
        AppState::load_state_snapshot(&state_snapshot_path)?
    } else {
        let now = chrono::Utc::now();
        RuleState {
            now,
            equity: config.rule_spec.account_size,
            balance: config.rule_spec.account_size,
            day_start_equity: config.rule_spec.account_size,
            day_start_time: day_start_for(now, config.rule_spec.zone()),
            initial_balance: config.rule_spec.account_size,
            floating_pnl: 0.0,
            commission: 0.0,
            swap: 0.0,
            other_fees: 0.0,
            trades: Vec::new(),
            is_news_blackout: false,
            open_positions: 0,
            last_trade_time: None,
            stage_start_time: Some(now),
            drawdown_start_time: None,
        }
    };

    let service_config = AsyncServiceConfig {
        fast_loop_interval: std::time::Duration::from_millis(config.fast_loop_ms),
        bar_loop_interval: std::time::Duration::from_secs(config.bar_loop_secs),
        reconcile_interval: std::time::Duration::from_secs(config.reconcile_interval_secs),
        health_check_interval: std::time::Duration::from_secs(config.health_check_interval_secs),
    };

    let app = Arc::new(AppState::new(
        config,
        context,
        governor,
        engine.clone(),
        safe_mode.clone(),
        drift,
        metrics,
        audit_log.clone(),
        monitor,
        initial_state,
    ));

    audit_log.log("run_start", serde_json::json!({"run_id": app.context.run_id}));

    let service = Arc::new(AsyncService::new(
        engine,
        service_config,
        Some(safe_mode.clone()),
        None,
        Some(audit_log.clone()),
    ));

    let (stop_tx, stop_rx) = watch::channel(false);
    let shutdown_app = app.clone();
    let shutdown_signal = tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        let _ = stop_tx.send(true);
        shutdown_app
    });

    service
        .run_forever(
            stop_rx,
            || async { Ok(()) },
            || async { Ok(()) },
        )
        .await;

    if let Ok(app) = shutdown_signal.await {
        if let Err(e) = app.persist_state_snapshot(app.config.journal_path.with_file_name("state_snapshot.json")) {
            error!(error = %e, "failed to persist final state snapshot");
        }
    }

    info!("ftmo-supervisor stopped cleanly");
    Ok(())
}
