// =============================================================================
// Runtime Configuration — RuleSpec + service tunables, with atomic save
// =============================================================================
//
// Every tunable the service loop needs lives here so the process can be
// reconfigured by editing one file and restarting. Persistence uses an
// atomic tmp + rename pattern to prevent corruption on crash, the same
// idiom `OrderJournal` and `SafeModeLatch` use. All fields carry
// `#[serde(default = "...")]` so that adding a new field never breaks
// loading an older config file.
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::rule_engine::spec::RuleSpec;

fn default_journal_path() -> PathBuf {
    PathBuf::from("state/journal.json")
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("state/audit.log")
}

fn default_safe_mode_path() -> PathBuf {
    PathBuf::from("state/safe_mode.json")
}

fn default_drift_state_path() -> PathBuf {
    PathBuf::from("state/drift_state.json")
}

fn default_max_requests_per_day() -> u32 {
    500
}

fn default_max_modifications_per_minute() -> u32 {
    20
}

fn default_min_seconds_between_requests() -> i64 {
    1
}

fn default_duplicate_window_seconds() -> i64 {
    5
}

fn default_duplicate_block() -> bool {
    true
}

fn default_drift_max_age_seconds() -> i64 {
    120
}

fn default_fast_loop_ms() -> u64 {
    500
}

fn default_bar_loop_secs() -> u64 {
    60
}

fn default_reconcile_interval_secs() -> u64 {
    30
}

fn default_health_check_interval_secs() -> u64 {
    10
}

/// Tunables layered on top of a frozen `RuleSpec`: file locations, throttle
/// limits, duplicate-suppression window, drift tolerance, and the four
/// service-loop intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub rule_spec: RuleSpec,

    #[serde(default = "default_journal_path")]
    pub journal_path: PathBuf,
    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: PathBuf,
    #[serde(default = "default_safe_mode_path")]
    pub safe_mode_path: PathBuf,
    #[serde(default = "default_drift_state_path")]
    pub drift_state_path: PathBuf,

    #[serde(default = "default_max_requests_per_day")]
    pub max_requests_per_day: u32,
    #[serde(default = "default_max_modifications_per_minute")]
    pub max_modifications_per_minute: u32,
    #[serde(default = "default_min_seconds_between_requests")]
    pub min_seconds_between_requests: i64,

    #[serde(default = "default_duplicate_window_seconds")]
    pub duplicate_window_seconds: i64,
    #[serde(default = "default_duplicate_block")]
    pub duplicate_block: bool,

    #[serde(default = "default_drift_max_age_seconds")]
    pub drift_max_age_seconds: i64,

    #[serde(default = "default_fast_loop_ms")]
    pub fast_loop_ms: u64,
    #[serde(default = "default_bar_loop_secs")]
    pub bar_loop_secs: u64,
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,
}

impl RuntimeConfig {
    /// Loads a config from `path` (JSON), validating that `rule_spec.timezone`
    /// parses as a real IANA zone — the one check promoted from "would panic
    /// later" to "fails startup now".
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;
        let config: RuntimeConfig = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;
        config
            .rule_spec
            .timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| anyhow::anyhow!("invalid IANA timezone: {}", config.rule_spec.timezone))?;
        info!(path = %path.display(), "runtime config loaded");
        Ok(config)
    }

    /// Atomic tmp + rename save, matching `OrderJournal::persist`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self).context("failed to serialise runtime config")?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp runtime config to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp runtime config to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountStage, FundedMode, MidnightPolicy, MtMMode};
    use tempfile::NamedTempFile;

    fn spec() -> RuleSpec {
        RuleSpec {
            account_size: 100_000.0,
            max_daily_loss: 5_000.0,
            max_total_loss: 10_000.0,
            challenge_target: 8_000.0,
            verification_target: 5_000.0,
            min_trading_days: 4,
            timezone: "Europe/Prague".into(),
            daily_loss_stop_pct: 0.8,
            max_loss_stop_pct: 0.8,
            midnight_policy: MidnightPolicy::None,
            midnight_window_minutes: 30,
            midnight_buffer_multiplier: 1.0,
            max_days_without_trade: 25,
            inactivity_warning_days: 5,
            drawdown_limit_pct: 0.07,
            drawdown_days_limit: 30,
            drawdown_warning_days: 5,
            stage: AccountStage::Challenge,
            funded_mode: FundedMode::Standard,
            strategy_is_legit: true,
            mtm_mode: MtMMode::WorstOhlc,
            fee_schedules: Default::default(),
            money_floor_buffer: 0.0,
        }
    }

    fn config() -> RuntimeConfig {
        RuntimeConfig {
            rule_spec: spec(),
            journal_path: default_journal_path(),
            audit_log_path: default_audit_log_path(),
            safe_mode_path: default_safe_mode_path(),
            drift_state_path: default_drift_state_path(),
            max_requests_per_day: default_max_requests_per_day(),
            max_modifications_per_minute: default_max_modifications_per_minute(),
            min_seconds_between_requests: default_min_seconds_between_requests(),
            duplicate_window_seconds: default_duplicate_window_seconds(),
            duplicate_block: default_duplicate_block(),
            drift_max_age_seconds: default_drift_max_age_seconds(),
            fast_loop_ms: default_fast_loop_ms(),
            bar_loop_secs: default_bar_loop_secs(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            health_check_interval_secs: default_health_check_interval_secs(),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let file = NamedTempFile::new().unwrap();
        let cfg = config();
        cfg.save(file.path()).unwrap();
        let loaded = RuntimeConfig::load(file.path()).unwrap();
        assert_eq!(loaded.rule_spec.account_size, cfg.rule_spec.account_size);
        assert_eq!(loaded.journal_path, cfg.journal_path);
    }

    #[test]
    fn load_rejects_invalid_timezone() {
        let file = NamedTempFile::new().unwrap();
        let mut cfg = config();
        cfg.rule_spec.timezone = "Not/AZone".into();
        cfg.save(file.path()).unwrap();
        assert!(RuntimeConfig::load(file.path()).is_err());
    }

    #[test]
    fn missing_optional_fields_fall_back_to_defaults() {
        let file = NamedTempFile::new().unwrap();
        let minimal = serde_json::json!({ "rule_spec": spec() });
        std::fs::write(file.path(), serde_json::to_string(&minimal).unwrap()).unwrap();
        let loaded = RuntimeConfig::load(file.path()).unwrap();
        assert_eq!(loaded.max_requests_per_day, default_max_requests_per_day());
        assert_eq!(loaded.duplicate_block, default_duplicate_block());
    }
}
