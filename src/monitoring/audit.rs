// =============================================================================
// Audit Log — append-only newline-delimited JSON record of every decision
// =============================================================================
//
// Every governor and execution-engine decision point writes one line here.
// The file is opened once and kept open for the run's lifetime; writes are
// serialised through a `parking_lot::Mutex<File>` rather than reopening the
// file per write, since this is on the hot path of every pre-trade check.
// =============================================================================

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
struct AuditRecord<'a> {
    ts: String,
    run_id: &'a Option<String>,
    config_hash: &'a Option<String>,
    event: &'a str,
    payload: serde_json::Value,
}

pub struct AuditLog {
    path: PathBuf,
    run_id: Option<String>,
    config_hash: Option<String>,
    file: Mutex<File>,
}

impl AuditLog {
    pub fn open(path: impl AsRef<Path>, run_id: Option<String>, config_hash: Option<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create audit log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open audit log at {}", path.display()))?;
        Ok(Self {
            path,
            run_id,
            config_hash,
            file: Mutex::new(file),
        })
    }

    /// Best-effort: a failed audit write is logged via `tracing` but never
    /// propagated — a supervisor must not stop trading because its own
    /// journal of the decision couldn't be written.
    pub fn log(&self, event: &str, payload: serde_json::Value) {
        let record = AuditRecord {
            ts: Utc::now().to_rfc3339(),
            run_id: &self.run_id,
            config_hash: &self.config_hash,
            event,
            payload,
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(err) => {
                error!(error = %err, event, "failed to serialise audit record");
                return;
            }
        };
        let mut file = self.file.lock();
        if let Err(err) = writeln!(file, "{line}") {
            error!(error = %err, path = %self.path.display(), "failed to append audit record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn log_appends_one_json_line_per_call() {
        let file = NamedTempFile::new().unwrap();
        std::fs::remove_file(file.path()).ok();
        let audit = AuditLog::open(file.path(), Some("run-1".into()), Some("deadbeef".into())).unwrap();

        audit.log("state_check", serde_json::json!({"allow": true}));
        audit.log("pre_trade", serde_json::json!({"allow": false, "reason": "Hard limit reached"}));

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "state_check");
        assert_eq!(first["run_id"], "run-1");
    }
}
