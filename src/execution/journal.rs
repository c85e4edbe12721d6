// =============================================================================
// Order Journal — durable, idempotent store keyed by client_order_id
// =============================================================================
//
// A single `OrderJournal` handle is owned by exactly one `ExecutionEngine`;
// concurrent callers are serialized through the `parking_lot::RwLock`. The
// backing store is a flat JSON file rewritten atomically (tmp + rename),
// matching the source project's `RuntimeConfig` persistence idiom, rather
// than a SQL table — see DESIGN.md for why this departs from the Python
// original's SQLite-backed journal.
// =============================================================================

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::models::JournalEntry;
use crate::types::JournalStatus;

#[derive(Debug, Default, Serialize, Deserialize)]
struct JournalFile {
    orders: BTreeMap<String, JournalEntry>,
}

pub struct OrderJournal {
    path: PathBuf,
    inner: RwLock<JournalFile>,
}

impl OrderJournal {
    /// Load an existing journal file, or start empty if none exists yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read journal from {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse journal from {}", path.display()))?
        } else {
            JournalFile::default()
        };
        info!(path = %path.display(), orders = inner.orders.len(), "order journal opened");
        Ok(Self {
            path,
            inner: RwLock::new(inner),
        })
    }

    /// Atomic insert. Returns `true` on success, `false` if the id already
    /// exists (idempotent, matching `IntegrityError` being a non-error).
    pub fn record_intent(&self, client_order_id: &str, payload: serde_json::Value) -> Result<bool> {
        {
            let inner = self.inner.read();
            if inner.orders.contains_key(client_order_id) {
                debug!(client_order_id, "record_intent: already present, idempotent no-op");
                return Ok(false);
            }
        }
        let mut inner = self.inner.write();
        if inner.orders.contains_key(client_order_id) {
            return Ok(false);
        }
        inner.orders.insert(
            client_order_id.to_string(),
            JournalEntry {
                client_order_id: client_order_id.to_string(),
                broker_order_id: None,
                status: JournalStatus::Intent,
                payload,
                created_at: Utc::now(),
            },
        );
        drop(inner);
        self.persist()?;
        Ok(true)
    }

    pub fn mark_submitted(&self, client_order_id: &str, broker_order_id: &str) -> Result<()> {
        {
            let mut inner = self.inner.write();
            if let Some(entry) = inner.orders.get_mut(client_order_id) {
                entry.broker_order_id = Some(broker_order_id.to_string());
                entry.status = JournalStatus::Submitted;
            }
        }
        self.persist()
    }

    /// Forward-only status transition; the caller is trusted not to regress
    /// the lifecycle (`intent -> submitted -> {open,partial,filled,...} ->
    /// closed`).
    pub fn mark_status(&self, client_order_id: &str, status: JournalStatus) -> Result<()> {
        {
            let mut inner = self.inner.write();
            if let Some(entry) = inner.orders.get_mut(client_order_id) {
                entry.status = status;
            }
        }
        self.persist()
    }

    pub fn get(&self, client_order_id: &str) -> Option<JournalEntry> {
        self.inner.read().orders.get(client_order_id).cloned()
    }

    pub fn list_open(&self) -> Vec<JournalEntry> {
        self.inner
            .read()
            .orders
            .values()
            .filter(|e| {
                matches!(
                    e.status,
                    JournalStatus::Intent
                        | JournalStatus::Submitted
                        | JournalStatus::Open
                        | JournalStatus::Partial
                )
            })
            .cloned()
            .collect()
    }

    fn persist(&self) -> Result<()> {
        let content = {
            let inner = self.inner.read();
            serde_json::to_string_pretty(&*inner).context("failed to serialise order journal")?
        };
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp journal to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to rename tmp journal to {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn journal() -> (OrderJournal, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        std::fs::remove_file(file.path()).ok();
        (OrderJournal::open(file.path()).unwrap(), file)
    }

    #[test]
    fn record_intent_then_get_round_trips() {
        let (journal, _file) = journal();
        assert!(journal
            .record_intent("X", serde_json::json!({"symbol": "EURUSD"}))
            .unwrap());
        let entry = journal.get("X").unwrap();
        assert_eq!(entry.client_order_id, "X");
        assert_eq!(entry.status, JournalStatus::Intent);
    }

    #[test]
    fn second_record_intent_is_idempotent() {
        let (journal, _file) = journal();
        assert!(journal.record_intent("X", serde_json::json!({"a": 1})).unwrap());
        assert!(!journal.record_intent("X", serde_json::json!({"a": 2})).unwrap());
        let entry = journal.get("X").unwrap();
        assert_eq!(entry.payload, serde_json::json!({"a": 1}));
    }

    #[test]
    fn mark_submitted_sets_broker_order_id_and_status() {
        let (journal, _file) = journal();
        journal.record_intent("X", serde_json::json!({})).unwrap();
        journal.mark_submitted("X", "B-1").unwrap();
        let entry = journal.get("X").unwrap();
        assert_eq!(entry.broker_order_id.as_deref(), Some("B-1"));
        assert_eq!(entry.status, JournalStatus::Submitted);
    }

    #[test]
    fn list_open_excludes_closed_orders() {
        let (journal, _file) = journal();
        journal.record_intent("X", serde_json::json!({})).unwrap();
        journal.record_intent("Y", serde_json::json!({})).unwrap();
        journal.mark_status("Y", JournalStatus::Closed).unwrap();
        let open = journal.list_open();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].client_order_id, "X");
    }

    #[test]
    fn reopening_an_existing_file_preserves_entries() {
        let file = NamedTempFile::new().unwrap();
        std::fs::remove_file(file.path()).ok();
        {
            let journal = OrderJournal::open(file.path()).unwrap();
            journal.record_intent("X", serde_json::json!({})).unwrap();
        }
        let reopened = OrderJournal::open(file.path()).unwrap();
        assert!(reopened.get("X").is_some());
    }
}
