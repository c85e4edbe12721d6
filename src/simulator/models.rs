// =============================================================================
// Simulation data structures
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Side;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceBar {
    pub time: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalAction {
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Signal {
    pub time: DateTime<Utc>,
    pub action: SignalAction,
    pub side: Side,
    pub size: f64,
    pub price: Option<f64>,
}

/// A position open within the signal-driven simulation. Distinct from
/// `execution::models::Position` (the broker's live view) — this one only
/// ever exists inside `simulate_signals`.
#[derive(Debug, Clone)]
pub struct OpenSimPosition {
    pub entry_time: DateTime<Utc>,
    pub side: Side,
    pub size: f64,
    pub entry_price: f64,
    pub symbol: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct MonteCarloConfig {
    pub slippage_range: (f64, f64),
    pub spread_range: (f64, f64),
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            slippage_range: (0.0, 0.0),
            spread_range: (0.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub equity_curve: Vec<EquityPoint>,
    pub passed: bool,
    pub failure_reason: Option<String>,
    pub trading_days: u32,
    pub target_progress: f64,
    pub violations: Vec<String>,
    pub min_daily_headroom: f64,
    pub min_max_headroom: f64,
    pub buffer_breaches: u32,
}
