// =============================================================================
// Execution data model — orders, journal rows, reconciliation reports
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BrokerOrderStatus, JournalStatus, Side};

/// Pip/lot metadata for a tradable symbol, as reported by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub symbol: String,
    pub pip_size: f64,
    pub pip_value_usd_per_lot: f64,
    pub min_lot: f64,
    pub lot_step: f64,
    pub max_lot: f64,
    pub tick_size: Option<f64>,
    pub tick_value: Option<f64>,
    pub digits: Option<u32>,
    pub contract_size: Option<f64>,
}

/// Produced by a `Strategy`; consumed by the governor and execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub time: DateTime<Utc>,
    pub estimated_risk: f64,
    #[serde(default)]
    pub reduce_only: bool,
    /// Identifies the originating signal for duplicate-fingerprint
    /// detection (§4.6 step 2). `None` disables fingerprint dedup for this
    /// intent — only the journal's `client_order_id` idempotence applies.
    #[serde(default)]
    pub intent_id: Option<String>,
    #[serde(default)]
    pub strategy_id: Option<String>,
}

/// The order as submitted to the broker, keyed by the caller-chosen
/// `client_order_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOrder {
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub time: DateTime<Utc>,
    pub price: Option<f64>,
    pub intent_id: Option<String>,
    pub strategy_id: Option<String>,
}

/// The broker's view of a submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerOrder {
    pub broker_order_id: String,
    pub client_order_id: String,
    pub status: BrokerOrderStatus,
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub time: DateTime<Utc>,
    pub price: Option<f64>,
}

/// An open position as reported by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub entry_price: f64,
    #[serde(default)]
    pub unrealized_pnl: f64,
}

/// Account-level snapshot from the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub equity: f64,
    pub balance: f64,
    pub margin: f64,
    pub free_margin: f64,
    pub currency: String,
}

/// Result of comparing the journal's open entries with the broker's open
/// set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub missing_in_broker: Vec<String>,
    pub missing_in_journal: Vec<String>,
    pub reconciled_closed: Vec<String>,
    pub reconciled_added: Vec<String>,
}

/// A durable row in the order journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub client_order_id: String,
    pub broker_order_id: Option<String>,
    pub status: JournalStatus,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
