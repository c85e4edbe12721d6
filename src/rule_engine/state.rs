// =============================================================================
// RuleState — mutable, single-writer account snapshot
// =============================================================================

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::time::{needs_day_reset, trading_day_for};

/// A closed trade. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub profit: f64,
}

/// The mutable account snapshot the governor evaluates against. Exactly one
/// writer: the async service's fast task (live) or the simulator (offline).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleState {
    pub now: DateTime<Utc>,
    pub equity: f64,
    pub balance: f64,
    pub day_start_equity: f64,
    pub day_start_time: DateTime<Utc>,
    pub initial_balance: f64,
    #[serde(default)]
    pub floating_pnl: f64,
    #[serde(default)]
    pub commission: f64,
    #[serde(default)]
    pub swap: f64,
    #[serde(default)]
    pub other_fees: f64,
    #[serde(default)]
    pub trades: Vec<Trade>,
    #[serde(default)]
    pub is_news_blackout: bool,
    #[serde(default)]
    pub open_positions: u32,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub stage_start_time: Option<DateTime<Utc>>,
    pub drawdown_start_time: Option<DateTime<Utc>>,
}

impl RuleState {
    /// `balance + floating_pnl - (commission + swap + other_fees)` when any
    /// cost or floating P&L is present; `equity` is authoritative otherwise.
    pub fn effective_equity(&self) -> f64 {
        let costs = self.commission + self.swap + self.other_fees;
        if self.floating_pnl != 0.0 || costs != 0.0 {
            self.balance + self.floating_pnl - costs
        } else {
            self.equity
        }
    }

    pub fn trading_days(&self, zone: Tz) -> u32 {
        trading_day_count(&self.trades, zone)
    }

    fn last_trade_timestamp(&self) -> Option<DateTime<Utc>> {
        if let Some(t) = self.last_trade_time {
            return Some(t);
        }
        self.trades.iter().map(|t| t.entry_time).max()
    }

    /// Civil days since the last trade entry, falling back to
    /// `stage_start_time` when no trade has occurred yet. `None` when
    /// neither is available.
    pub fn days_since_last_trade(&self, zone: Tz) -> Option<i64> {
        let last = self.last_trade_timestamp().or(self.stage_start_time)?;
        Some((trading_day_for(self.now, zone) - trading_day_for(last, zone)).num_days())
    }

    pub fn drawdown_pct(&self) -> f64 {
        if self.initial_balance <= 0.0 {
            return 0.0;
        }
        ((self.initial_balance - self.effective_equity()) / self.initial_balance).max(0.0)
    }

    /// Must be called before `check_violation` if the caller wants
    /// `drawdown_start_time` to reflect the current tick: the engine itself
    /// never mutates state.
    pub fn update_drawdown_start(&mut self, limit_pct: f64) {
        if limit_pct <= 0.0 {
            self.drawdown_start_time = None;
            return;
        }
        if self.drawdown_pct() >= limit_pct {
            if self.drawdown_start_time.is_none() {
                self.drawdown_start_time = Some(self.now);
            }
        } else {
            self.drawdown_start_time = None;
        }
    }

    pub fn drawdown_days(&self, zone: Tz) -> Option<i64> {
        let start = self.drawdown_start_time?;
        Some((trading_day_for(self.now, zone) - trading_day_for(start, zone)).num_days())
    }

    /// Rolls `day_start_time`/`day_start_equity` forward if `now` has
    /// crossed a civil-day boundary since the last roll.
    pub fn roll_day_if_needed(&mut self, zone: Tz) {
        if needs_day_reset(self.now, self.day_start_time, zone) {
            self.day_start_time = super::time::day_start_for(self.now, zone);
            self.day_start_equity = self.effective_equity();
        }
    }
}

/// Number of distinct civil days (in `zone`) on which any trade's entry
/// occurred.
pub fn trading_day_count(trades: &[Trade], zone: Tz) -> u32 {
    use std::collections::HashSet;
    trades
        .iter()
        .map(|t| trading_day_for(t.entry_time, zone))
        .collect::<HashSet<_>>()
        .len() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn prague() -> Tz {
        "Europe/Prague".parse().unwrap()
    }

    fn base_state() -> RuleState {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        RuleState {
            now,
            equity: 100_000.0,
            balance: 100_000.0,
            day_start_equity: 100_000.0,
            day_start_time: now,
            initial_balance: 100_000.0,
            floating_pnl: 0.0,
            commission: 0.0,
            swap: 0.0,
            other_fees: 0.0,
            trades: Vec::new(),
            is_news_blackout: false,
            open_positions: 0,
            last_trade_time: None,
            stage_start_time: Some(now),
            drawdown_start_time: None,
        }
    }

    #[test]
    fn effective_equity_falls_back_to_equity_with_no_costs() {
        let state = base_state();
        assert_eq!(state.effective_equity(), state.equity);
    }

    #[test]
    fn effective_equity_nets_costs_and_floating_pnl() {
        let mut state = base_state();
        state.floating_pnl = -200.0;
        state.commission = 10.0;
        state.swap = 5.0;
        state.other_fees = 1.0;
        assert_eq!(state.effective_equity(), 100_000.0 - 200.0 - 16.0);
    }

    #[test]
    fn drawdown_start_time_latches_until_below_limit() {
        let mut state = base_state();
        state.balance = 90_000.0;
        state.equity = 90_000.0;
        state.update_drawdown_start(0.07);
        assert!(state.drawdown_start_time.is_some());
        let first = state.drawdown_start_time;
        // A later, still-breaching tick must not move the origin.
        state.now = state.now + chrono::Duration::hours(1);
        state.update_drawdown_start(0.07);
        assert_eq!(state.drawdown_start_time, first);
        // Recovery clears it.
        state.balance = 100_000.0;
        state.equity = 100_000.0;
        state.update_drawdown_start(0.07);
        assert!(state.drawdown_start_time.is_none());
    }

    #[test]
    fn trading_day_count_dedupes_by_civil_day() {
        let tz = prague();
        let trades = vec![
            Trade {
                symbol: "EURUSD".into(),
                entry_time: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
                exit_time: None,
                entry_price: 1.1,
                exit_price: None,
                profit: 10.0,
            },
            Trade {
                symbol: "EURUSD".into(),
                entry_time: Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap(),
                exit_time: None,
                entry_price: 1.1,
                exit_price: None,
                profit: -5.0,
            },
            Trade {
                symbol: "EURUSD".into(),
                entry_time: Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap(),
                exit_time: None,
                entry_price: 1.1,
                exit_price: None,
                profit: 3.0,
            },
        ];
        assert_eq!(trading_day_count(&trades, tz), 2);
    }
}
