// =============================================================================
// RuleEngine — pure functions over spec + state
// =============================================================================
//
// Nothing here mutates `RuleState`. A caller that wants `drawdown_start_time`
// to reflect the current tick must call `state.update_drawdown_start` first;
// `check_violation` does so defensively (matching the source project's own
// engine, which re-derives drawdown origin on every check) but callers
// should not rely on that as their only call site.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::spec::{NewsPolicy, RuleSpec};
use super::state::{trading_day_count, RuleState};
use crate::execution::models::OrderIntent;
use crate::types::AccountStage;

/// A single compliance breach, in the deterministic order `check_violation`
/// produces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub code: &'static str,
    pub message: &'static str,
}

/// Outcome of `pre_trade_check`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreTradeResult {
    pub allow: bool,
    pub reason: String,
}

/// Stateless evaluator bound to one frozen `RuleSpec`.
pub struct RuleEngine {
    pub spec: RuleSpec,
}

impl RuleEngine {
    pub fn new(spec: RuleSpec) -> Self {
        Self { spec }
    }

    pub fn remaining_daily_loss(equity: f64, day_start_equity: f64, max_daily_loss: f64) -> f64 {
        let daily_loss = (day_start_equity - equity).max(0.0);
        max_daily_loss - daily_loss
    }

    pub fn remaining_max_loss(equity: f64, initial_balance: f64, max_total_loss: f64) -> f64 {
        let total_loss = (initial_balance - equity).max(0.0);
        max_total_loss - total_loss
    }

    pub fn trading_day_count(trades: &[crate::rule_engine::state::Trade], zone: chrono_tz::Tz) -> u32 {
        trading_day_count(trades, zone)
    }

    pub fn trading_days_remaining(&self, state: &RuleState) -> u32 {
        let trading_days = state.trading_days(self.spec.zone());
        self.spec.min_trading_days.saturating_sub(trading_days)
    }

    /// `false` unconditionally once funded: funded accounts have no profit
    /// target left to reach.
    pub fn profit_target_reached(&self, state: &RuleState) -> bool {
        if self.spec.stage == AccountStage::Funded {
            return false;
        }
        let profit = state.effective_equity() - state.initial_balance;
        profit >= self.spec.profit_target()
    }

    pub fn needs_min_trading_days(&self, state: &RuleState) -> bool {
        self.profit_target_reached(state) && self.trading_days_remaining(state) > 0
    }

    /// Deterministic-order violation list: strategy legitimacy, then daily
    /// loss, then max loss, then inactivity, then internal drawdown, then
    /// prolonged drawdown. The engine does not mutate `state`; it only reads
    /// `drawdown_start_time` as the caller last set it.
    pub fn check_violation(&self, state: &RuleState) -> Vec<Violation> {
        let mut violations = Vec::new();

        if !self.spec.strategy_is_legit {
            violations.push(Violation {
                code: "STRATEGY_FORBIDDEN",
                message: "Strategy flagged as not legitimate or forbidden.",
            });
        }

        let equity = state.effective_equity();

        let remaining_daily = Self::remaining_daily_loss(
            equity,
            state.day_start_equity,
            self.spec.max_daily_loss,
        );
        if remaining_daily <= 0.0 {
            violations.push(Violation {
                code: "DAILY_LOSS_LIMIT",
                message: "Max daily loss breached.",
            });
        }

        let remaining_total =
            Self::remaining_max_loss(equity, state.initial_balance, self.spec.max_total_loss);
        if remaining_total <= 0.0 {
            violations.push(Violation {
                code: "MAX_LOSS_LIMIT",
                message: "Max loss breached.",
            });
        }

        if self.spec.max_days_without_trade > 0 {
            if let Some(days) = state.days_since_last_trade(self.spec.zone()) {
                if days >= self.spec.max_days_without_trade as i64 {
                    violations.push(Violation {
                        code: "INACTIVITY_LIMIT",
                        message: "Inactivity limit exceeded.",
                    });
                }
            }
        }

        if self.spec.drawdown_limit_pct > 0.0 && state.drawdown_pct() >= self.spec.drawdown_limit_pct {
            violations.push(Violation {
                code: "INTERNAL_DRAWDOWN_LIMIT",
                message: "Internal drawdown limit breached.",
            });
        }

        if self.spec.drawdown_days_limit > 0 {
            if let Some(days) = state.drawdown_days(self.spec.zone()) {
                if days >= self.spec.drawdown_days_limit as i64 {
                    violations.push(Violation {
                        code: "PROLONGED_DRAWDOWN",
                        message: "Drawdown duration exceeded limit.",
                    });
                }
            }
        }

        violations
    }

    /// Denies on: forbidden strategy; active news blackout when the news
    /// policy applies; either hard limit already breached; or the intent's
    /// estimated risk alone would exceed either headroom. Allows otherwise.
    pub fn pre_trade_check(&self, intent: &OrderIntent, state: &RuleState) -> PreTradeResult {
        if !self.spec.strategy_is_legit {
            return PreTradeResult {
                allow: false,
                reason: "Strategy flagged as forbidden".into(),
            };
        }

        if self.spec.news_policy() == NewsPolicy::Apply && state.is_news_blackout {
            return PreTradeResult {
                allow: false,
                reason: "News restriction window active".into(),
            };
        }

        let equity = state.effective_equity();
        let remaining_daily = Self::remaining_daily_loss(
            equity,
            state.day_start_equity,
            self.spec.max_daily_loss,
        );
        if remaining_daily <= 0.0 {
            return PreTradeResult {
                allow: false,
                reason: "Daily loss limit reached".into(),
            };
        }

        let remaining_total =
            Self::remaining_max_loss(equity, state.initial_balance, self.spec.max_total_loss);
        if remaining_total <= 0.0 {
            return PreTradeResult {
                allow: false,
                reason: "Max loss limit reached".into(),
            };
        }

        if intent.estimated_risk >= remaining_daily {
            return PreTradeResult {
                allow: false,
                reason: "Order risk exceeds remaining daily loss".into(),
            };
        }

        if intent.estimated_risk >= remaining_total {
            return PreTradeResult {
                allow: false,
                reason: "Order risk exceeds remaining max loss".into(),
            };
        }

        PreTradeResult {
            allow: true,
            reason: "Allowed".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule_engine::spec::RuleSpec;
    use crate::types::{FundedMode, MidnightPolicy, MtMMode, Side};
    use chrono::{TimeZone, Utc};

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

    fn state() -> crate::rule_engine::state::RuleState {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        crate::rule_engine::state::RuleState {
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
    fn remaining_loss_helpers_are_symmetric() {
        assert_eq!(RuleEngine::remaining_daily_loss(95_000.0, 100_000.0, 5_000.0), 0.0);
        assert_eq!(RuleEngine::remaining_max_loss(90_000.0, 100_000.0, 10_000.0), 0.0);
    }

    #[test]
    fn check_violation_reports_daily_loss_limit() {
        let engine = RuleEngine::new(spec());
        let mut s = state();
        s.equity = 94_999.0;
        s.balance = 94_999.0;
        let violations = engine.check_violation(&s);
        assert!(violations.iter().any(|v| v.code == "DAILY_LOSS_LIMIT"));
    }

    #[test]
    fn check_violation_order_is_deterministic() {
        let mut forbidden = spec();
        forbidden.strategy_is_legit = false;
        let engine = RuleEngine::new(forbidden);
        let mut s = state();
        s.equity = 0.0;
        s.balance = 0.0;
        let violations = engine.check_violation(&s);
        assert_eq!(violations[0].code, "STRATEGY_FORBIDDEN");
        assert_eq!(violations[1].code, "DAILY_LOSS_LIMIT");
        assert_eq!(violations[2].code, "MAX_LOSS_LIMIT");
    }

    #[test]
    fn pre_trade_check_denies_when_risk_exceeds_headroom() {
        let engine = RuleEngine::new(spec());
        let s = state();
        let intent = OrderIntent {
            symbol: "EURUSD".into(),
            side: Side::Buy,
            volume: 1.0,
            time: s.now,
            estimated_risk: 6_000.0,
            reduce_only: false,
            intent_id: None,
            strategy_id: None,
        };
        let result = engine.pre_trade_check(&intent, &s);
        assert!(!result.allow);
    }

    #[test]
    fn pre_trade_check_allows_small_risk() {
        let engine = RuleEngine::new(spec());
        let s = state();
        let intent = OrderIntent {
            symbol: "EURUSD".into(),
            side: Side::Buy,
            volume: 1.0,
            time: s.now,
            estimated_risk: 100.0,
            reduce_only: false,
            intent_id: None,
            strategy_id: None,
        };
        assert!(engine.pre_trade_check(&intent, &s).allow);
    }

    #[test]
    fn profit_target_reached_is_always_false_once_funded() {
        let mut funded = spec();
        funded.stage = AccountStage::Funded;
        let engine = RuleEngine::new(funded);
        let mut s = state();
        s.equity = 200_000.0;
        s.balance = 200_000.0;
        assert!(!engine.profit_target_reached(&s));
    }
}
