// =============================================================================
// Risk Governor — latched state machine enforcing buffers and hard limits
// =============================================================================
//
// Unlike the four independent circuit breakers this module's ancestor used
// to track, a single `RiskDecision` now carries the governor's entire
// judgement for a tick: whether trading is allowed, whether positions must
// be flattened, and whether only reduce-only orders are permitted. Once a
// hard limit or a rule violation fires, the governor latches disabled and
// stays that way until `reset_disable` is called explicitly — there is no
// automatic daily reset of the disabled latch, only of the per-day buffers
// the spec itself resets via `RuleState::roll_day_if_needed`.
// =============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::execution::models::OrderIntent;
use crate::monitoring::audit::AuditLog;
use crate::monitoring::monitor::Monitor;
use crate::rule_engine::engine::RuleEngine;
use crate::rule_engine::spec::RuleSpec;
use crate::rule_engine::state::RuleState;
use crate::rule_engine::time::in_midnight_window;
use crate::types::MidnightPolicy;

/// The governor's full judgement for a single evaluation tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDecision {
    pub allow: bool,
    pub reason: String,
    #[serde(default)]
    pub flatten: bool,
    #[serde(default)]
    pub reduce_only: bool,
}

impl RiskDecision {
    fn new(allow: bool, reason: impl Into<String>) -> Self {
        Self {
            allow,
            reason: reason.into(),
            flatten: false,
            reduce_only: false,
        }
    }

    fn flatten(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
            flatten: true,
            reduce_only: false,
        }
    }

    fn reduce_only(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
            flatten: false,
            reduce_only: true,
        }
    }
}

/// `daily` and `max` headroom in money, ahead of either buffer or hard limit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RuleHeadroom {
    pub daily: f64,
    pub max: f64,
}

struct Inner {
    disabled: bool,
    disable_reason: Option<String>,
}

/// Owns no trading state itself — `RuleState` is supplied by the caller on
/// every call — but latches its own disabled flag behind a lock so it can be
/// shared across the async service's tasks.
pub struct RiskGovernor {
    engine: RuleEngine,
    audit_log: Option<Arc<AuditLog>>,
    monitor: Option<Arc<Monitor>>,
    inner: RwLock<Inner>,
}

impl RiskGovernor {
    pub fn new(engine: RuleEngine, audit_log: Option<Arc<AuditLog>>, monitor: Option<Arc<Monitor>>) -> Self {
        Self {
            engine,
            audit_log,
            monitor,
            inner: RwLock::new(Inner {
                disabled: false,
                disable_reason: None,
            }),
        }
    }

    pub fn spec(&self) -> &RuleSpec {
        &self.engine.spec
    }

    pub fn disable(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let mut inner = self.inner.write();
        inner.disabled = true;
        inner.disable_reason = Some(reason.clone());
        warn!(reason = %reason, "risk governor disabled");
    }

    pub fn reset_disable(&self) {
        let mut inner = self.inner.write();
        inner.disabled = false;
        inner.disable_reason = None;
    }

    pub fn disabled_reason(&self) -> Option<String> {
        self.inner.read().disable_reason.clone()
    }

    fn log(&self, event: &str, payload: serde_json::Value) {
        if let Some(audit) = &self.audit_log {
            audit.log(event, payload);
        }
    }

    fn notify_buffer(&self, which: &str, remaining: f64) {
        if let Some(monitor) = &self.monitor {
            monitor.rule_buffer_breach(which, remaining);
        }
    }

    fn notify_flatten(&self, reason: &str) {
        if let Some(monitor) = &self.monitor {
            monitor.flatten_trigger(reason);
        }
    }

    fn notify_inactivity(&self, message: &str) {
        if let Some(monitor) = &self.monitor {
            monitor.inactivity_warning(message);
        }
    }

    pub fn rule_headroom(&self, state: &RuleState) -> RuleHeadroom {
        let equity = state.effective_equity();
        RuleHeadroom {
            daily: RuleEngine::remaining_daily_loss(equity, state.day_start_equity, self.engine.spec.max_daily_loss),
            max: RuleEngine::remaining_max_loss(equity, state.initial_balance, self.engine.spec.max_total_loss),
        }
    }

    /// `(daily_buffer, max_buffer, in_midnight_window)`, switching to the
    /// midnight-multiplied buffers only while `MidnightPolicy::Buffer` is
    /// active and the clock is inside the configured window.
    fn effective_buffers(&self, state: &RuleState) -> (f64, f64, bool) {
        let spec = &self.engine.spec;
        let in_window = in_midnight_window(state.now, spec.zone(), spec.midnight_window_minutes);
        if in_window && spec.midnight_policy == MidnightPolicy::Buffer {
            (spec.midnight_daily_buffer(), spec.midnight_max_buffer(), in_window)
        } else {
            (spec.effective_daily_buffer(), spec.effective_max_buffer(), in_window)
        }
    }

    /// The ten-step state evaluation: latched disable, rule violations, hard
    /// limits, midnight flatten/reduce policy, then daily/max buffers.
    pub fn evaluate_state(&self, state: &mut RuleState) -> RiskDecision {
        state.roll_day_if_needed(self.engine.spec.zone());
        state.update_drawdown_start(self.engine.spec.drawdown_limit_pct);

        if let Some(reason) = self.inner.read().disable_reason.clone() {
            let decision = RiskDecision::flatten(reason);
            self.notify_flatten(&decision.reason);
            self.log(
                "state_check",
                serde_json::json!({"allow": decision.allow, "reason": decision.reason, "flatten": decision.flatten}),
            );
            return decision;
        }

        let violations = self.engine.check_violation(state);
        if let Some(first) = violations.first() {
            self.disable(first.message);
            let decision = RiskDecision::flatten(first.message);
            self.notify_flatten(&decision.reason);
            self.log(
                "state_check",
                serde_json::json!({"allow": decision.allow, "reason": decision.reason, "flatten": decision.flatten}),
            );
            return decision;
        }

        let headroom = self.rule_headroom(state);
        if headroom.daily <= 0.0 || headroom.max <= 0.0 {
            self.disable("Hard limit reached");
            let decision = RiskDecision::flatten("Hard limit reached");
            self.notify_flatten(&decision.reason);
            self.log(
                "state_check",
                serde_json::json!({"allow": decision.allow, "reason": decision.reason, "flatten": decision.flatten}),
            );
            return decision;
        }

        let (daily_buffer, max_buffer, in_window) = self.effective_buffers(state);

        if in_window && self.engine.spec.midnight_policy == MidnightPolicy::Flatten {
            let decision = RiskDecision::flatten("Midnight flatten policy active");
            self.notify_flatten(&decision.reason);
            self.log(
                "state_check",
                serde_json::json!({"allow": decision.allow, "reason": decision.reason, "flatten": decision.flatten}),
            );
            return decision;
        }
        if in_window && self.engine.spec.midnight_policy == MidnightPolicy::Reduce {
            let decision = RiskDecision::reduce_only("Midnight reduce-only policy active");
            self.log(
                "state_check",
                serde_json::json!({
                    "allow": decision.allow, "reason": decision.reason,
                    "flatten": decision.flatten, "reduce_only": decision.reduce_only,
                }),
            );
            return decision;
        }

        if headroom.daily <= daily_buffer {
            self.notify_buffer("daily", headroom.daily);
            let decision = RiskDecision::new(false, "Daily loss buffer reached");
            self.log(
                "state_check",
                serde_json::json!({"allow": decision.allow, "reason": decision.reason, "flatten": decision.flatten}),
            );
            return decision;
        }

        if headroom.max <= max_buffer {
            self.notify_buffer("max", headroom.max);
            let decision = RiskDecision::new(false, "Max loss buffer reached");
            self.log(
                "state_check",
                serde_json::json!({"allow": decision.allow, "reason": decision.reason, "flatten": decision.flatten}),
            );
            return decision;
        }

        let decision = RiskDecision::new(true, "Healthy");
        self.log("state_check", serde_json::json!({"allow": decision.allow, "reason": decision.reason}));
        decision
    }

    pub fn check_inactivity(&self, state: &RuleState) -> Vec<String> {
        let spec = &self.engine.spec;
        let mut warnings = Vec::new();

        if let Some(days) = state.days_since_last_trade(spec.zone()) {
            let warn_after = spec.max_days_without_trade.saturating_sub(spec.inactivity_warning_days);
            if days >= warn_after as i64 {
                let message = format!("Inactivity warning: {days} days since last trade");
                self.notify_inactivity(&message);
                self.log("inactivity_warning", serde_json::json!({"kind": "no_trade", "days": days}));
                warnings.push(message);
            }
        }

        if let Some(days) = state.drawdown_days(spec.zone()) {
            let warn_after = spec.drawdown_days_limit.saturating_sub(spec.drawdown_warning_days);
            if days >= warn_after as i64 {
                let message = format!("Drawdown duration warning: {days} days");
                self.notify_inactivity(&message);
                self.log("inactivity_warning", serde_json::json!({"kind": "drawdown", "days": days}));
                warnings.push(message);
            }
        }

        warnings
    }

    /// `reduce_only` intents bypass an active flatten/reduce state
    /// unconditionally — unwinding risk is always permitted, even while the
    /// governor is otherwise denying new exposure.
    pub fn pre_trade(&self, intent: &OrderIntent, state: &mut RuleState) -> RiskDecision {
        let state_check = self.evaluate_state(state);
        if !state_check.allow {
            if intent.reduce_only && (state_check.reduce_only || state_check.flatten) {
                let decision = RiskDecision {
                    allow: true,
                    reason: "Reduce-only allowed".into(),
                    flatten: state_check.flatten,
                    reduce_only: true,
                };
                self.log(
                    "pre_trade",
                    serde_json::json!({
                        "allow": decision.allow, "reason": decision.reason, "flatten": decision.flatten,
                        "reduce_only": decision.reduce_only, "symbol": intent.symbol, "side": intent.side,
                        "volume": intent.volume,
                    }),
                );
                return decision;
            }
            self.log(
                "pre_trade",
                serde_json::json!({
                    "allow": state_check.allow, "reason": state_check.reason, "flatten": state_check.flatten,
                    "reduce_only": state_check.reduce_only, "symbol": intent.symbol, "side": intent.side,
                    "volume": intent.volume,
                }),
            );
            return state_check;
        }

        let pre_trade = self.engine.pre_trade_check(intent, state);
        if !pre_trade.allow {
            let decision = RiskDecision::new(false, pre_trade.reason);
            self.log(
                "pre_trade",
                serde_json::json!({
                    "allow": decision.allow, "reason": decision.reason, "flatten": decision.flatten,
                    "symbol": intent.symbol, "side": intent.side, "volume": intent.volume,
                }),
            );
            return decision;
        }

        if intent.reduce_only {
            let decision = RiskDecision {
                allow: true,
                reason: "Allowed reduce-only".into(),
                flatten: false,
                reduce_only: true,
            };
            self.log(
                "pre_trade",
                serde_json::json!({
                    "allow": decision.allow, "reason": decision.reason, "reduce_only": decision.reduce_only,
                    "symbol": intent.symbol, "side": intent.side, "volume": intent.volume,
                }),
            );
            return decision;
        }

        let headroom = self.rule_headroom(state);
        let (daily_buffer, max_buffer, _) = self.effective_buffers(state);

        if intent.estimated_risk >= headroom.daily - daily_buffer {
            let decision = RiskDecision::new(false, "Order would breach daily buffer");
            self.log(
                "pre_trade",
                serde_json::json!({
                    "allow": decision.allow, "reason": decision.reason,
                    "symbol": intent.symbol, "side": intent.side, "volume": intent.volume,
                }),
            );
            return decision;
        }

        if intent.estimated_risk >= headroom.max - max_buffer {
            let decision = RiskDecision::new(false, "Order would breach max buffer");
            self.log(
                "pre_trade",
                serde_json::json!({
                    "allow": decision.allow, "reason": decision.reason,
                    "symbol": intent.symbol, "side": intent.side, "volume": intent.volume,
                }),
            );
            return decision;
        }

        let decision = RiskDecision::new(true, "Allowed");
        self.log(
            "pre_trade",
            serde_json::json!({
                "allow": decision.allow, "reason": decision.reason,
                "symbol": intent.symbol, "side": intent.side, "volume": intent.volume,
            }),
        );
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountStage, FundedMode, MtMMode, Side};
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

    fn state() -> RuleState {
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

    fn governor(spec: RuleSpec) -> RiskGovernor {
        RiskGovernor::new(RuleEngine::new(spec), None, None)
    }

    #[test]
    fn evaluate_state_is_healthy_by_default() {
        let gov = governor(spec());
        let mut s = state();
        let decision = gov.evaluate_state(&mut s);
        assert!(decision.allow);
        assert_eq!(decision.reason, "Healthy");
    }

    #[test]
    fn evaluate_state_latches_disabled_on_violation() {
        let gov = governor(spec());
        let mut s = state();
        s.equity = 94_000.0;
        s.balance = 94_000.0;
        let first = gov.evaluate_state(&mut s);
        assert!(!first.allow);
        assert!(first.flatten);

        // Recovery of equity does not clear the latch: it is first-reason-wins
        // and requires an explicit reset.
        s.equity = 100_000.0;
        s.balance = 100_000.0;
        let second = gov.evaluate_state(&mut s);
        assert!(!second.allow);
        assert_eq!(second.reason, first.reason);

        gov.reset_disable();
        let third = gov.evaluate_state(&mut s);
        assert!(third.allow);
    }

    #[test]
    fn evaluate_state_denies_within_daily_buffer() {
        let mut spec = spec();
        spec.daily_loss_stop_pct = 0.1; // buffer kicks in at 90% of the limit
        let gov = governor(spec);
        let mut s = state();
        s.equity = 95_500.0; // 4_500 lost of 5_000 -> inside the buffer, not yet violating
        s.balance = 95_500.0;
        let decision = gov.evaluate_state(&mut s);
        assert!(!decision.allow);
        assert!(!decision.flatten);
        assert_eq!(decision.reason, "Daily loss buffer reached");
    }

    #[test]
    fn midnight_flatten_policy_flattens_inside_window() {
        let mut spec = spec();
        spec.midnight_policy = MidnightPolicy::Flatten;
        spec.midnight_window_minutes = 60;
        let gov = governor(spec);
        let mut s = state();
        s.now = Utc.with_ymd_and_hms(2024, 6, 1, 21, 30, 0).unwrap(); // 23:30 Prague (CEST, UTC+2)
        let decision = gov.evaluate_state(&mut s);
        assert!(!decision.allow);
        assert!(decision.flatten);
        assert_eq!(decision.reason, "Midnight flatten policy active");
    }

    #[test]
    fn pre_trade_allows_reduce_only_while_flattened() {
        let gov = governor(spec());
        gov.disable("Hard limit reached");
        let mut s = state();
        let intent = OrderIntent {
            symbol: "EURUSD".into(),
            side: Side::Sell,
            volume: 0.5,
            time: s.now,
            estimated_risk: 100.0,
            reduce_only: true,
            intent_id: None,
            strategy_id: None,
        };
        let decision = gov.pre_trade(&intent, &mut s);
        assert!(decision.allow);
        assert!(decision.reduce_only);
    }

    #[test]
    fn evaluate_state_midnight_buffer_denies_near_limit_state() {
        let mut spec = spec();
        spec.max_daily_loss = 5_000.0;
        spec.max_total_loss = 10_000.0;
        spec.daily_loss_stop_pct = 0.8;
        spec.max_loss_stop_pct = 0.8;
        spec.midnight_policy = MidnightPolicy::Buffer;
        spec.midnight_window_minutes = 60;
        spec.midnight_buffer_multiplier = 2.0;
        let gov = governor(spec);
        let mut s = state();
        s.now = Utc.with_ymd_and_hms(2024, 6, 1, 21, 50, 0).unwrap(); // 23:50 Prague (CEST, UTC+2)
        s.equity = 96_500.0;
        s.balance = 96_500.0;
        s.day_start_equity = 100_000.0;
        s.initial_balance = 100_000.0;

        let decision = gov.evaluate_state(&mut s);
        assert!(!decision.allow);
        assert!(!decision.flatten);
        assert_eq!(decision.reason, "Daily loss buffer reached");
    }

    #[test]
    fn midnight_reduce_policy_denies_new_risk_but_allows_reduce_only_intent() {
        let mut spec = spec();
        spec.max_daily_loss = 5_000.0;
        spec.max_total_loss = 10_000.0;
        spec.daily_loss_stop_pct = 0.8;
        spec.max_loss_stop_pct = 0.8;
        spec.midnight_policy = MidnightPolicy::Reduce;
        spec.midnight_window_minutes = 60;
        spec.midnight_buffer_multiplier = 2.0;
        let gov = governor(spec);
        let mut s = state();
        s.now = Utc.with_ymd_and_hms(2024, 6, 1, 21, 50, 0).unwrap(); // 23:50 Prague (CEST, UTC+2)
        s.equity = 99_000.0;
        s.balance = 99_000.0;
        s.day_start_equity = 100_000.0;
        s.initial_balance = 100_000.0;

        let state_check = gov.evaluate_state(&mut s);
        assert!(!state_check.allow);
        assert!(state_check.reduce_only);

        let intent = OrderIntent {
            symbol: "EURUSD".into(),
            side: Side::Sell,
            volume: 0.1,
            time: s.now,
            estimated_risk: 0.0,
            reduce_only: true,
            intent_id: None,
            strategy_id: None,
        };
        let pre_trade = gov.pre_trade(&intent, &mut s);
        assert!(pre_trade.allow);
        assert!(pre_trade.reduce_only);
    }

    #[test]
    fn pre_trade_denies_non_reduce_only_while_flattened() {
        let gov = governor(spec());
        gov.disable("Hard limit reached");
        let mut s = state();
        let intent = OrderIntent {
            symbol: "EURUSD".into(),
            side: Side::Buy,
            volume: 0.5,
            time: s.now,
            estimated_risk: 100.0,
            reduce_only: false,
            intent_id: None,
            strategy_id: None,
        };
        let decision = gov.pre_trade(&intent, &mut s);
        assert!(!decision.allow);
    }
}
