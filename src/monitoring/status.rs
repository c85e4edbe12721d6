// =============================================================================
// Runtime status snapshot — the read-only view exposed to operators
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::risk::RiskGovernor;
use crate::rule_engine::state::RuleState;
use crate::types::AccountStage;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RuleHeadroom {
    pub daily: f64,
    pub maximum: f64,
    pub daily_buffer: f64,
    pub max_buffer: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub now: DateTime<Utc>,
    pub stage: AccountStage,
    pub equity: f64,
    pub balance: f64,
    pub day_start_equity: f64,
    pub day_start_time: DateTime<Utc>,
    pub open_positions: u32,
    pub trading_days: u32,
    pub min_trading_days_remaining: u32,
    pub days_since_last_trade: Option<i64>,
    pub drawdown_pct: f64,
    pub drawdown_days: Option<i64>,
    pub headroom: RuleHeadroom,
    pub target_progress: f64,
}

/// Builds a read-only snapshot for dashboards and health checks; never
/// mutates `state`.
pub fn build_runtime_status(state: &RuleState, governor: &RiskGovernor) -> RuntimeStatus {
    let spec = governor.spec();
    let zone = spec.zone();
    let headroom = governor.rule_headroom(state);

    let target_progress = if spec.stage == AccountStage::Funded {
        0.0
    } else {
        let target = spec.profit_target();
        let profit = state.effective_equity() - state.initial_balance;
        if target == 0.0 {
            0.0
        } else {
            profit / target
        }
    };

    let trading_days = state.trading_days(zone);
    let min_remaining = spec.min_trading_days.saturating_sub(trading_days);

    RuntimeStatus {
        now: state.now,
        stage: spec.stage,
        equity: state.effective_equity(),
        balance: state.balance,
        day_start_equity: state.day_start_equity,
        day_start_time: state.day_start_time,
        open_positions: state.open_positions,
        trading_days,
        min_trading_days_remaining: min_remaining,
        days_since_last_trade: state.days_since_last_trade(zone),
        drawdown_pct: state.drawdown_pct(),
        drawdown_days: state.drawdown_days(zone),
        headroom: RuleHeadroom {
            daily: headroom.daily,
            maximum: headroom.max,
            daily_buffer: spec.effective_daily_buffer(),
            max_buffer: spec.effective_max_buffer(),
        },
        target_progress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule_engine::engine::RuleEngine;
    use crate::rule_engine::spec::RuleSpec;
    use crate::types::{FundedMode, MidnightPolicy, MtMMode};
    use chrono::TimeZone;

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
            equity: 104_000.0,
            balance: 104_000.0,
            day_start_equity: 104_000.0,
            day_start_time: now,
            initial_balance: 100_000.0,
            floating_pnl: 0.0,
            commission: 0.0,
            swap: 0.0,
            other_fees: 0.0,
            trades: Vec::new(),
            is_news_blackout: false,
            open_positions: 1,
            last_trade_time: None,
            stage_start_time: Some(now),
            drawdown_start_time: None,
        }
    }

    #[test]
    fn target_progress_reflects_profit_over_target() {
        let governor = RiskGovernor::new(RuleEngine::new(spec()), None, None);
        let status = build_runtime_status(&state(), &governor);
        assert_eq!(status.target_progress, 4_000.0 / 8_000.0);
    }

    #[test]
    fn funded_stage_always_has_zero_target_progress() {
        let mut funded = spec();
        funded.stage = AccountStage::Funded;
        let governor = RiskGovernor::new(RuleEngine::new(funded), None, None);
        let status = build_runtime_status(&state(), &governor);
        assert_eq!(status.target_progress, 0.0);
    }
}
