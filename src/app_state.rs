// =============================================================================
// Central Application State — ties the five subsystems together
// =============================================================================
//
// The single source of truth the service loop and its periodic tasks share.
// Every subsystem keeps its own interior mutability (`RwLock`/`Mutex` behind
// an `Arc`); `AppState` just collects the handles and knows how to persist
// the derived `status` file alongside them.
// =============================================================================

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;

use crate::execution::ExecutionEngine;
use crate::monitoring::{AuditLog, Monitor, RuntimeStatus};
use crate::risk::RiskGovernor;
use crate::runtime::{DailyMetricsTracker, DriftTracker, RunContext, SafeModeLatch};
use crate::runtime_config::RuntimeConfig;
use crate::rule_engine::state::RuleState;

/// Central application state shared across the service loop's tasks via
/// `Arc<AppState>`. One instance per process.
pub struct AppState {
    pub config: RuntimeConfig,
    pub context: RunContext,

    pub governor: Arc<RiskGovernor>,
    pub engine: Arc<ExecutionEngine>,
    pub safe_mode: Arc<SafeModeLatch>,
    pub drift: Arc<DriftTracker>,
    pub metrics: Arc<DailyMetricsTracker>,
    pub audit_log: Arc<AuditLog>,
    pub monitor: Arc<Monitor>,

    /// The one mutable account snapshot the fast loop writes and every other
    /// task reads.
    pub state: RwLock<RuleState>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RuntimeConfig,
        context: RunContext,
        governor: Arc<RiskGovernor>,
        engine: Arc<ExecutionEngine>,
        safe_mode: Arc<SafeModeLatch>,
        drift: Arc<DriftTracker>,
        metrics: Arc<DailyMetricsTracker>,
        audit_log: Arc<AuditLog>,
        monitor: Arc<Monitor>,
        initial_state: RuleState,
    ) -> Self {
        Self {
            config,
            context,
            governor,
            engine,
            safe_mode,
            drift,
            metrics,
            audit_log,
            monitor,
            state: RwLock::new(initial_state),
        }
    }

    /// Snapshots the current `RuleState` under the governor's rule spec into
    /// a `RuntimeStatus`, the payload persisted to the `status` file and
    /// consumed by anything watching the account from outside the process.
    pub fn build_status(&self) -> RuntimeStatus {
        let state = self.state.read();
        crate::monitoring::build_runtime_status(&state, &self.governor)
    }

    /// Atomic tmp + rename write of the derived status snapshot, matching
    /// every other persisted file in the kernel.
    pub fn persist_status(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let status = self.build_status();
        let content = serde_json::to_string_pretty(&status).context("failed to serialise runtime status")?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp status to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp status to {}", path.display()))?;
        Ok(())
    }

    /// Atomic tmp + rename write of the raw `RuleState`, the "state_snapshot"
    /// file per the external-interfaces contract — the thing a restarted
    /// process resumes from.
    pub fn persist_state_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = {
            let state = self.state.read();
            serde_json::to_string_pretty(&*state).context("failed to serialise rule state")?
        };
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp state snapshot to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp state snapshot to {}", path.display()))?;
        Ok(())
    }

    /// Loads a previously persisted `RuleState` from `path`, for `--resume`.
    pub fn load_state_snapshot(path: impl AsRef<Path>) -> Result<RuleState> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read state snapshot from {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("failed to parse state snapshot from {}", path.display()))
    }
}
