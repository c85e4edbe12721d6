// =============================================================================
// Execution Engine — idempotent, duplicate-suppressing order submission
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::json;
use tracing::{info, warn};

use super::broker::Broker;
use super::journal::OrderJournal;
use super::models::{BrokerOrder, ExecutionOrder, ReconcileReport};
use super::throttle::RequestThrottle;
use crate::error::SupervisorError;
use crate::monitoring::audit::AuditLog;
use crate::monitoring::monitor::Monitor;
use crate::types::{JournalStatus, RequestKind, Side};

/// A stable identity for duplicate detection, independent of
/// `client_order_id`: two intents with the same fingerprint submitted
/// within `duplicate_window` are treated as the same trading decision
/// resubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Fingerprint {
    intent_id: String,
    strategy_id: String,
    symbol: String,
    side: Side,
    volume_milli: i64,
    price_milli: i64,
}

impl Fingerprint {
    fn from_order(order: &ExecutionOrder) -> Option<Self> {
        let intent_id = order.intent_id.clone()?;
        Some(Self {
            intent_id,
            strategy_id: order.strategy_id.clone().unwrap_or_default(),
            symbol: order.symbol.clone(),
            side: order.side,
            volume_milli: (order.volume * 1_000_000.0).round() as i64,
            price_milli: (order.price.unwrap_or(0.0) * 1_000_000.0).round() as i64,
        })
    }
}

pub struct DuplicateConfig {
    pub window: Duration,
    pub block: bool,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            window: Duration::seconds(5),
            block: true,
        }
    }
}

/// Ties the broker, journal, and throttle together to submit orders exactly
/// once per `client_order_id`, suppress fingerprint duplicates, and
/// reconcile the journal against the broker's open set.
pub struct ExecutionEngine {
    broker: Arc<dyn Broker>,
    journal: Arc<OrderJournal>,
    throttle: Option<Arc<RequestThrottle>>,
    audit_log: Option<Arc<AuditLog>>,
    monitor: Option<Arc<Monitor>>,
    duplicate: DuplicateConfig,
    recent_fingerprints: Mutex<Vec<(Fingerprint, DateTime<Utc>)>>,
}

impl ExecutionEngine {
    pub fn new(
        broker: Arc<dyn Broker>,
        journal: Arc<OrderJournal>,
        throttle: Option<Arc<RequestThrottle>>,
        audit_log: Option<Arc<AuditLog>>,
        monitor: Option<Arc<Monitor>>,
        duplicate: DuplicateConfig,
    ) -> Self {
        Self {
            broker,
            journal,
            throttle,
            audit_log,
            monitor,
            duplicate,
            recent_fingerprints: Mutex::new(Vec::new()),
        }
    }

    fn log(&self, event: &str, payload: serde_json::Value) {
        if let Some(audit) = &self.audit_log {
            audit.log(event, payload);
        }
    }

    fn check_throttle(&self, kind: RequestKind, now: DateTime<Utc>) -> Result<(), SupervisorError> {
        let Some(throttle) = &self.throttle else {
            return Ok(());
        };
        let decision = throttle.allow(kind, now);
        if !decision.allow {
            self.log("throttle_block", json!({"kind": format!("{kind:?}"), "reason": decision.reason}));
            return Err(SupervisorError::ThrottleBlock(decision.reason.to_string()));
        }
        Ok(())
    }

    pub async fn check_connection(&self) -> bool {
        let ok = self.broker.ping().await;
        if !ok {
            if let Some(monitor) = &self.monitor {
                monitor.disconnect("Broker connection lost");
            }
            self.log("disconnect", json!({"reason": "ping failed"}));
        }
        ok
    }

    /// Step 1: idempotent short-circuit via the journal. Step 2: fingerprint
    /// duplicate suppression. Step 3-6: record, throttle, submit, transition.
    pub async fn place_order(&self, order: &ExecutionOrder) -> Result<BrokerOrder, SupervisorError> {
        if let Some(existing) = self.journal.get(&order.client_order_id) {
            if let Some(broker_order_id) = existing.broker_order_id {
                return Ok(BrokerOrder {
                    broker_order_id,
                    client_order_id: existing.client_order_id,
                    status: broker_status_from_journal(existing.status),
                    symbol: existing
                        .payload
                        .get("symbol")
                        .and_then(|v| v.as_str())
                        .unwrap_or(&order.symbol)
                        .to_string(),
                    side: order.side,
                    volume: existing
                        .payload
                        .get("volume")
                        .and_then(|v| v.as_f64())
                        .unwrap_or(order.volume),
                    time: order.time,
                    price: existing.payload.get("price").and_then(|v| v.as_f64()),
                });
            }
        }

        if let Some(fingerprint) = Fingerprint::from_order(order) {
            let mut recent = self.recent_fingerprints.lock();
            recent.retain(|(_, seen_at)| order.time - *seen_at < self.duplicate.window);
            if recent.iter().any(|(fp, _)| fp == &fingerprint) {
                self.log(
                    "duplicate_order_detected",
                    json!({"client_order_id": order.client_order_id, "intent_id": fingerprint.intent_id}),
                );
                if self.duplicate.block {
                    return Err(SupervisorError::DuplicateOrder(format!(
                        "duplicate intent {} within {}s window",
                        fingerprint.intent_id,
                        self.duplicate.window.num_seconds()
                    )));
                }
            }
            recent.push((fingerprint, order.time));
        }

        let existing = self.journal.get(&order.client_order_id);
        if existing.is_none() {
            self.journal.record_intent(&order.client_order_id, order_payload(order))?;
        }

        self.check_throttle(RequestKind::Place, order.time)?;

        let broker_order = self.broker.place_order(order).await?;
        self.journal
            .mark_submitted(&order.client_order_id, &broker_order.broker_order_id)?;
        self.journal
            .mark_status(&order.client_order_id, JournalStatus::from(broker_order.status))?;

        info!(
            client_order_id = %order.client_order_id,
            broker_order_id = %broker_order.broker_order_id,
            status = %broker_order.status,
            "order submitted"
        );
        self.log(
            "order_submitted",
            json!({
                "client_order_id": order.client_order_id,
                "broker_order_id": broker_order.broker_order_id,
                "symbol": order.symbol,
                "side": order.side,
                "volume": order.volume,
                "status": broker_order.status,
            }),
        );

        if broker_order.status == crate::types::BrokerOrderStatus::Rejected {
            warn!(client_order_id = %order.client_order_id, "order rejected by broker");
            self.log(
                "order_rejected",
                json!({
                    "client_order_id": order.client_order_id,
                    "broker_order_id": broker_order.broker_order_id,
                }),
            );
        }

        Ok(broker_order)
    }

    pub async fn cancel_order(&self, broker_order_id: &str, now: DateTime<Utc>) -> Result<(), SupervisorError> {
        self.check_throttle(RequestKind::Cancel, now)?;
        self.broker.cancel_order(broker_order_id).await?;
        self.log("order_canceled", json!({"broker_order_id": broker_order_id}));
        Ok(())
    }

    pub async fn modify_order(
        &self,
        broker_order_id: &str,
        price: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<(), SupervisorError> {
        self.check_throttle(RequestKind::Modify, now)?;
        self.broker.modify_order(broker_order_id, price).await?;
        self.log(
            "order_modified",
            json!({"broker_order_id": broker_order_id, "price": price}),
        );
        Ok(())
    }

    /// Transitions journal entries with no matching broker order to
    /// `closed`, and creates journal rows for broker orders the journal
    /// never saw.
    pub async fn reconcile(&self) -> Result<ReconcileReport, SupervisorError> {
        let broker_open = self.broker.list_open_orders().await?;
        let broker_ids: std::collections::HashSet<&str> =
            broker_open.iter().map(|o| o.client_order_id.as_str()).collect();

        let mut report = ReconcileReport::default();

        for entry in self.journal.list_open() {
            if !broker_ids.contains(entry.client_order_id.as_str()) {
                self.journal.mark_status(&entry.client_order_id, JournalStatus::Closed)?;
                report.missing_in_broker.push(entry.client_order_id.clone());
                report.reconciled_closed.push(entry.client_order_id.clone());
                self.log(
                    "order_reconciled",
                    json!({"client_order_id": entry.client_order_id, "status": "closed"}),
                );
            }
        }

        for order in &broker_open {
            if self.journal.get(&order.client_order_id).is_none() {
                self.journal.record_intent(&order.client_order_id, json!({}))?;
                self.journal
                    .mark_status(&order.client_order_id, JournalStatus::Submitted)?;
                report.missing_in_journal.push(order.client_order_id.clone());
                report.reconciled_added.push(order.client_order_id.clone());
                self.log(
                    "order_reconciled",
                    json!({"client_order_id": order.client_order_id, "status": "submitted"}),
                );
            }
        }

        Ok(report)
    }
}

fn order_payload(order: &ExecutionOrder) -> serde_json::Value {
    json!({
        "client_order_id": order.client_order_id,
        "symbol": order.symbol,
        "side": order.side,
        "volume": order.volume,
        "time": order.time,
        "price": order.price,
        "intent_id": order.intent_id,
        "strategy_id": order.strategy_id,
    })
}

/// The journal's status is a superset of the broker's; a terminal journal
/// status reconstructs to the nearest broker-facing equivalent, and every
/// still-open status passes through unchanged.
fn broker_status_from_journal(status: JournalStatus) -> crate::types::BrokerOrderStatus {
    use crate::types::BrokerOrderStatus as B;
    match status {
        JournalStatus::Intent | JournalStatus::Submitted => B::Submitted,
        JournalStatus::Open => B::Open,
        JournalStatus::Partial => B::Partial,
        JournalStatus::Filled => B::Filled,
        JournalStatus::Canceled => B::Canceled,
        JournalStatus::Rejected => B::Rejected,
        JournalStatus::Closed => B::Filled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::broker::PaperBroker;
    use chrono::TimeZone as _;
    use tempfile::NamedTempFile;

    fn journal() -> (Arc<OrderJournal>, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        std::fs::remove_file(file.path()).ok();
        (Arc::new(OrderJournal::open(file.path()).unwrap()), file)
    }

    fn order(client_order_id: &str) -> ExecutionOrder {
        ExecutionOrder {
            client_order_id: client_order_id.into(),
            symbol: "EURUSD".into(),
            side: Side::Buy,
            volume: 1.0,
            time: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
            price: Some(1.10),
            intent_id: None,
            strategy_id: None,
        }
    }

    #[tokio::test]
    async fn place_order_is_idempotent_across_engines_sharing_a_journal() {
        let (journal, _file) = journal();
        let paper = Arc::new(PaperBroker::new());
        let broker: Arc<dyn Broker> = paper.clone();

        let engine1 = ExecutionEngine::new(
            broker.clone(),
            journal.clone(),
            None,
            None,
            None,
            DuplicateConfig::default(),
        );
        let first = engine1.place_order(&order("X")).await.unwrap();

        // A fresh engine instance, same broker + journal, simulating a
        // restart.
        let engine2 = ExecutionEngine::new(broker.clone(), journal.clone(), None, None, None, DuplicateConfig::default());
        let second = engine2.place_order(&order("X")).await.unwrap();

        assert_eq!(first.broker_order_id, second.broker_order_id);
        assert_eq!(paper.place_call_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_fingerprint_within_window_is_blocked() {
        let (journal, _file) = journal();
        let broker: Arc<dyn Broker> = Arc::new(PaperBroker::new());
        let engine = ExecutionEngine::new(broker, journal, None, None, None, DuplicateConfig::default());

        let mut first = order("A");
        first.intent_id = Some("signal-1".into());
        first.strategy_id = Some("trend".into());
        engine.place_order(&first).await.unwrap();

        let mut second = order("B");
        second.intent_id = Some("signal-1".into());
        second.strategy_id = Some("trend".into());
        let result = engine.place_order(&second).await;
        assert!(matches!(result, Err(SupervisorError::DuplicateOrder(_))));
    }

    #[tokio::test]
    async fn reconcile_closes_journal_entries_missing_from_broker() {
        let (journal, _file) = journal();
        journal.record_intent("orphan", json!({})).unwrap();
        journal.mark_submitted("orphan", "B-orphan").unwrap();
        journal.mark_status("orphan", JournalStatus::Open).unwrap();

        let broker: Arc<dyn Broker> = Arc::new(PaperBroker::new());
        let engine = ExecutionEngine::new(broker, journal.clone(), None, None, None, DuplicateConfig::default());

        let report = engine.reconcile().await.unwrap();
        assert_eq!(report.missing_in_broker, vec!["orphan".to_string()]);
        assert!(journal.list_open().is_empty());
    }

    #[tokio::test]
    async fn reconcile_is_idempotent_with_no_broker_changes() {
        let (journal, _file) = journal();
        let broker: Arc<dyn Broker> = Arc::new(PaperBroker::new());
        let engine = ExecutionEngine::new(broker, journal.clone(), None, None, None, DuplicateConfig::default());
        let first = engine.reconcile().await.unwrap();
        let second = engine.reconcile().await.unwrap();
        assert_eq!(first.missing_in_broker, second.missing_in_broker);
        assert_eq!(first.missing_in_journal, second.missing_in_journal);
    }
}
