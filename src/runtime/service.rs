// =============================================================================
// Async Service Loop — four cooperative periodic tasks
// =============================================================================
//
// A tokio-native rewrite of the source project's single-threaded asyncio
// TaskGroup: each of the four tasks still runs on its own fixed interval and
// still catches and contains any error by escalating to safe mode, but here
// each callback is a real `tokio::spawn`ed task rather than a cooperative
// coroutine, and blocking work is pushed to `spawn_blocking` instead of
// `asyncio.to_thread`.
// =============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info};

use crate::execution::ExecutionEngine;
use crate::monitoring::AuditLog;
use crate::runtime::context::RunContext;
use crate::runtime::drift::DriftTracker;
use crate::runtime::safe_mode::SafeModeLatch;
use crate::rule_engine::state::RuleState;

#[derive(Debug, Clone, Copy)]
pub struct AsyncServiceConfig {
    pub fast_loop_interval: StdDuration,
    pub bar_loop_interval: StdDuration,
    pub reconcile_interval: StdDuration,
    pub health_check_interval: StdDuration,
}

impl Default for AsyncServiceConfig {
    fn default() -> Self {
        Self {
            fast_loop_interval: StdDuration::from_millis(500),
            bar_loop_interval: StdDuration::from_secs(60),
            reconcile_interval: StdDuration::from_secs(30),
            health_check_interval: StdDuration::from_secs(10),
        }
    }
}

/// Bundle packaging is out of scope; the service loop only needs a seam to
/// call into it once per civil day. The core ships no non-trivial
/// implementation.
#[async_trait::async_trait]
pub trait DailyBundleEmitter: Send + Sync {
    async fn emit(&self, context: &RunContext, state: &RuleState);
}

pub struct NoopBundleEmitter;

#[async_trait::async_trait]
impl DailyBundleEmitter for NoopBundleEmitter {
    async fn emit(&self, _context: &RunContext, _state: &RuleState) {}
}

/// Runs `fast`, `bar`, `reconcile`, and `health` as independent periodic
/// tasks until `stop` fires. Each task's body is supplied by the caller;
/// `reconcile` and `health` have built-in default bodies wired to
/// `ExecutionEngine`.
pub struct AsyncService {
    engine: Arc<ExecutionEngine>,
    config: AsyncServiceConfig,
    safe_mode: Option<Arc<SafeModeLatch>>,
    drift: Option<Arc<DriftTracker>>,
    audit_log: Option<Arc<AuditLog>>,
}

impl AsyncService {
    pub fn new(
        engine: Arc<ExecutionEngine>,
        config: AsyncServiceConfig,
        safe_mode: Option<Arc<SafeModeLatch>>,
        drift: Option<Arc<DriftTracker>>,
        audit_log: Option<Arc<AuditLog>>,
    ) -> Self {
        Self {
            engine,
            config,
            safe_mode,
            drift,
            audit_log,
        }
    }

    fn log(&self, event: &str, payload: serde_json::Value) {
        if let Some(audit) = &self.audit_log {
            audit.log(event, payload);
        }
    }

    async fn contain<F, Fut>(&self, name: &str, body: &F)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        if let Err(err) = body().await {
            error!(loop_name = name, error = %err, "service loop error");
            self.log("service_error", serde_json::json!({"loop": name, "error": err.to_string()}));
            if let Some(safe_mode) = &self.safe_mode {
                let _ = safe_mode.enable(format!("{name} loop error: {err}"));
            }
        }
    }

    async fn run_periodic<F, Fut>(
        &self,
        name: &'static str,
        interval: StdDuration,
        mut stop: watch::Receiver<bool>,
        body: F,
    ) where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        while !*stop.borrow() {
            let start = Instant::now();
            self.contain(name, &body).await;
            let elapsed = start.elapsed();
            let delay = interval.saturating_sub(elapsed);
            if delay.is_zero() {
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop.changed() => {}
            }
        }
    }

    /// Spawns all four tasks and waits for `stop` to fire. `fast` and `bar`
    /// callbacks are host-supplied (market data / strategy logic lives
    /// outside this crate); `reconcile` and `health` default to the
    /// engine's own `reconcile`/`check_connection`.
    pub async fn run_forever<FastFut, BarFut>(
        self: Arc<Self>,
        mut stop: watch::Receiver<bool>,
        fast: impl Fn() -> FastFut + Send + Sync + 'static,
        bar: impl Fn() -> BarFut + Send + Sync + 'static,
    ) where
        FastFut: Future<Output = anyhow::Result<()>> + Send,
        BarFut: Future<Output = anyhow::Result<()>> + Send,
    {
        info!("async service loop starting");

        let fast_service = self.clone();
        let fast_stop = stop.clone();
        let fast_task = tokio::spawn(async move {
            fast_service.run_periodic("fast", fast_service.config.fast_loop_interval, fast_stop, fast).await;
        });

        let bar_service = self.clone();
        let bar_stop = stop.clone();
        let bar_task = tokio::spawn(async move {
            bar_service.run_periodic("bar", bar_service.config.bar_loop_interval, bar_stop, bar).await;
        });

        let reconcile_service = self.clone();
        let reconcile_stop = stop.clone();
        let reconcile_task = tokio::spawn(async move {
            let engine = reconcile_service.engine.clone();
            let drift = reconcile_service.drift.clone();
            reconcile_service
                .run_periodic("reconcile", reconcile_service.config.reconcile_interval, reconcile_stop, move || {
                    let engine = engine.clone();
                    let drift = drift.clone();
                    async move {
                        let report = engine.reconcile().await?;
                        if let Some(drift) = &drift {
                            drift.update(&report, chrono::Utc::now())?;
                        }
                        Ok(())
                    }
                })
                .await;
        });

        let health_service = self.clone();
        let health_stop = stop.clone();
        let health_task = tokio::spawn(async move {
            let engine = health_service.engine.clone();
            health_service
                .run_periodic("health", health_service.config.health_check_interval, health_stop, move || {
                    let engine = engine.clone();
                    async move {
                        engine.check_connection().await;
                        Ok(())
                    }
                })
                .await;
        });

        let _ = stop.changed().await;
        let _ = tokio::join!(fast_task, bar_task, reconcile_task, health_task);
        info!("async service loop stopped");
    }
}
