// =============================================================================
// Drift Tracker — ages broker/journal mismatches into a safe-mode trigger
// =============================================================================
//
// `ReconcileReport` only reports this tick's mismatches; a single transient
// one (e.g. an order still in flight to the broker) is normal. This tracker
// remembers when each mismatch key was first seen, and escalates to
// `SafeModeLatch::enable` only once one has persisted past `max_age`.
// =============================================================================

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::execution::models::ReconcileReport;
use crate::monitoring::AuditLog;
use crate::runtime::safe_mode::SafeModeLatch;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DriftEntry {
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    alerted: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DriftFile {
    mismatches: HashMap<String, DriftEntry>,
}

pub struct DriftTracker {
    path: PathBuf,
    max_age: Duration,
    audit_log: Option<Arc<AuditLog>>,
    safe_mode: Option<Arc<SafeModeLatch>>,
    state: Mutex<DriftFile>,
}

impl DriftTracker {
    pub fn open(
        path: impl AsRef<Path>,
        max_age_seconds: i64,
        audit_log: Option<Arc<AuditLog>>,
        safe_mode: Option<Arc<SafeModeLatch>>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read drift state from {}", path.display()))?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            DriftFile::default()
        };
        Ok(Self {
            path,
            max_age: Duration::seconds(max_age_seconds.max(0)),
            audit_log,
            safe_mode,
            state: Mutex::new(state),
        })
    }

    fn log(&self, event: &str, payload: serde_json::Value) {
        if let Some(audit) = &self.audit_log {
            audit.log(event, payload);
        }
    }

    fn persist(&self) -> Result<()> {
        let content = {
            let state = self.state.lock();
            serde_json::to_string_pretty(&*state).context("failed to serialise drift state")?
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("failed to create drift state directory")?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp drift state to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to rename tmp drift state to {}", self.path.display()))?;
        Ok(())
    }

    /// Reconciles the report's mismatch keys against tracked state: new keys
    /// are recorded, persisting keys are aged (and escalated to safe mode
    /// past `max_age`), and keys no longer present are marked resolved.
    pub fn update(&self, report: &ReconcileReport, now: DateTime<Utc>) -> Result<()> {
        let mut current_keys = Vec::new();
        for order_id in &report.missing_in_broker {
            current_keys.push(format!("missing_in_broker:{order_id}"));
        }
        for order_id in &report.missing_in_journal {
            current_keys.push(format!("missing_in_journal:{order_id}"));
        }

        let mut escalations = Vec::new();
        {
            let mut state = self.state.lock();

            for key in &current_keys {
                match state.mismatches.get_mut(key) {
                    None => {
                        state.mismatches.insert(
                            key.clone(),
                            DriftEntry {
                                first_seen: now,
                                last_seen: now,
                                alerted: false,
                            },
                        );
                        let (kind, order_id) = split_key(key);
                        self.log("drift_detected", serde_json::json!({"kind": kind, "order_id": order_id}));
                    }
                    Some(entry) => {
                        entry.last_seen = now;
                        let duration = now - entry.first_seen;
                        if duration >= self.max_age && !entry.alerted {
                            entry.alerted = true;
                            let (kind, order_id) = split_key(key);
                            self.log(
                                "drift_unresolved",
                                serde_json::json!({
                                    "kind": kind, "order_id": order_id,
                                    "duration_seconds": duration.num_seconds(),
                                }),
                            );
                            escalations.push(format!("Drift unresolved: {kind} {order_id}"));
                        }
                    }
                }
            }

            let stale: Vec<String> = state
                .mismatches
                .keys()
                .filter(|key| !current_keys.contains(key))
                .cloned()
                .collect();
            for key in stale {
                if let Some(entry) = state.mismatches.remove(&key) {
                    let (kind, order_id) = split_key(&key);
                    let duration = entry.last_seen - entry.first_seen;
                    self.log(
                        "drift_resolved",
                        serde_json::json!({
                            "kind": kind, "order_id": order_id,
                            "duration_seconds": duration.num_seconds(),
                        }),
                    );
                }
            }
        }

        self.persist()?;

        if let Some(safe_mode) = &self.safe_mode {
            for reason in escalations {
                safe_mode.enable(reason)?;
            }
        }

        Ok(())
    }
}

fn split_key(key: &str) -> (&str, &str) {
    key.split_once(':').unwrap_or((key, ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::NamedTempFile;

    fn tracker_path() -> (PathBuf, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        std::fs::remove_file(file.path()).ok();
        (file.path().to_path_buf(), file)
    }

    fn report_with(missing_in_broker: Vec<&str>) -> ReconcileReport {
        ReconcileReport {
            missing_in_broker: missing_in_broker.into_iter().map(String::from).collect(),
            missing_in_journal: Vec::new(),
            reconciled_closed: Vec::new(),
            reconciled_added: Vec::new(),
        }
    }

    #[test]
    fn fresh_mismatch_does_not_escalate_immediately() {
        let (path, _file) = tracker_path();
        let tracker = DriftTracker::open(&path, 60, None, None).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        tracker.update(&report_with(vec!["X"]), t0).unwrap();
        assert!(!tracker.state.lock().mismatches["missing_in_broker:X"].alerted);
    }

    #[test]
    fn persisting_mismatch_escalates_to_safe_mode_past_max_age() {
        let (path, _file) = tracker_path();
        let (safe_path, _safe_file) = tracker_path();
        let safe_mode = Arc::new(SafeModeLatch::open(&safe_path, true, None, None).unwrap());
        let tracker = DriftTracker::open(&path, 60, None, Some(safe_mode.clone())).unwrap();

        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        tracker.update(&report_with(vec!["X"]), t0).unwrap();
        assert!(!safe_mode.is_enabled());

        let t1 = t0 + Duration::seconds(90);
        tracker.update(&report_with(vec!["X"]), t1).unwrap();
        assert!(safe_mode.is_enabled());
    }

    #[test]
    fn resolved_mismatch_is_dropped_from_state() {
        let (path, _file) = tracker_path();
        let tracker = DriftTracker::open(&path, 60, None, None).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        tracker.update(&report_with(vec!["X"]), t0).unwrap();
        tracker.update(&report_with(vec![]), t0 + Duration::seconds(5)).unwrap();
        assert!(tracker.state.lock().mismatches.is_empty());
    }
}
