// =============================================================================
// Safe Mode Latch — the supervisor's own kill switch
// =============================================================================
//
// Persisted to disk (teacher's tmp+rename atomic-save idiom) so a crash and
// restart does not silently clear an operational failure the operator never
// saw. `latched = true` (the default) means `enable` is a no-op once already
// enabled, matching a breaker that requires an explicit `clear`.
// =============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::monitoring::{AuditLog, Monitor};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafeModeState {
    pub enabled: bool,
    pub reason: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

pub struct SafeModeLatch {
    path: PathBuf,
    latched: bool,
    monitor: Option<Arc<Monitor>>,
    audit_log: Option<Arc<AuditLog>>,
    state: RwLock<SafeModeState>,
}

impl SafeModeLatch {
    pub fn open(
        path: impl AsRef<Path>,
        latched: bool,
        monitor: Option<Arc<Monitor>>,
        audit_log: Option<Arc<AuditLog>>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read safe-mode state from {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse safe-mode state from {}", path.display()))?
        } else {
            SafeModeState::default()
        };
        Ok(Self {
            path,
            latched,
            monitor,
            audit_log,
            state: RwLock::new(state),
        })
    }

    pub fn state(&self) -> SafeModeState {
        self.state.read().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.read().enabled
    }

    fn log(&self, enabled: bool, reason: &str) {
        if let Some(audit) = &self.audit_log {
            audit.log("safe_mode", serde_json::json!({"enabled": enabled, "reason": reason}));
        }
    }

    fn persist(&self) -> Result<()> {
        let content = {
            let state = self.state.read();
            serde_json::to_string_pretty(&*state).context("failed to serialise safe-mode state")?
        };
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::create_dir_all(self.path.parent().unwrap_or_else(|| Path::new(".")))
            .context("failed to create safe-mode state directory")?;
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp safe-mode state to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to rename tmp safe-mode state to {}", self.path.display()))?;
        Ok(())
    }

    /// No-op if already enabled and `latched`, matching the first-failure
    /// reason taking priority over any later trigger.
    pub fn enable(&self, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        {
            let state = self.state.read();
            if state.enabled && self.latched {
                return Ok(());
            }
        }
        {
            let mut state = self.state.write();
            *state = SafeModeState {
                enabled: true,
                reason: Some(reason.clone()),
                since: Some(Utc::now()),
            };
        }
        self.persist()?;
        warn!(reason = %reason, "safe mode enabled");
        if let Some(monitor) = &self.monitor {
            monitor.safe_mode(&reason);
        }
        self.log(true, &reason);
        Ok(())
    }

    pub fn clear(&self, reason: &str) -> Result<()> {
        {
            let mut state = self.state.write();
            *state = SafeModeState {
                enabled: false,
                reason: Some(reason.to_string()),
                since: Some(Utc::now()),
            };
        }
        self.persist()?;
        info!(reason, "safe mode cleared");
        self.log(false, reason);
        Ok(())
    }
}
