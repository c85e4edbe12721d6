// =============================================================================
// Evaluation Simulator — offline replay of closed trades or raw signals
// against the rule engine
// =============================================================================

use rand::Rng;

use super::models::{EquityPoint, MonteCarloConfig, OpenSimPosition, PriceBar, Signal, SignalAction, SimulationResult};
use crate::rule_engine::engine::RuleEngine;
use crate::rule_engine::spec::RuleSpec;
use crate::rule_engine::state::{Trade, trading_day_count};
use crate::rule_engine::time::{day_start_for, needs_day_reset};
use crate::types::{AccountStage, MtMMode, Side};

pub struct EvaluationSimulator {
    pub spec: RuleSpec,
    engine: RuleEngine,
}

impl EvaluationSimulator {
    pub fn new(spec: RuleSpec) -> Self {
        let engine = RuleEngine::new(spec.clone());
        Self { spec, engine }
    }

    /// Replays closed trades in entry-time order, finalizing the moment any
    /// rule violation appears.
    pub fn simulate_trades(&self, trades: &[Trade], initial_balance: f64) -> SimulationResult {
        let mut ordered = trades.to_vec();
        ordered.sort_by_key(|t| t.entry_time);

        let zone = self.spec.zone();
        let mut now = ordered.first().map(|t| t.entry_time).unwrap_or_else(chrono::Utc::now);
        let stage_start_time = now;
        let mut day_start_time = day_start_for(now, zone);
        let mut day_start_equity = initial_balance;

        let mut equity = initial_balance;
        let mut balance = initial_balance;
        let daily_buffer = self.spec.effective_daily_buffer();
        let max_buffer = self.spec.effective_max_buffer();
        let mut min_daily_headroom =
            RuleEngine::remaining_daily_loss(equity, day_start_equity, self.spec.max_daily_loss);
        let mut min_max_headroom = RuleEngine::remaining_max_loss(equity, initial_balance, self.spec.max_total_loss);
        let mut buffer_breaches = 0u32;
        let mut equity_curve = vec![EquityPoint { time: now, equity }];
        let mut violations: Vec<String> = Vec::new();
        let mut drawdown_start_time = None;
        let mut closed_so_far: Vec<Trade> = Vec::with_capacity(ordered.len());

        for trade in &ordered {
            if needs_day_reset(trade.entry_time, day_start_time, zone) {
                day_start_time = day_start_for(trade.entry_time, zone);
                day_start_equity = equity;
            }

            equity += trade.profit;
            balance = equity;
            now = trade.exit_time.unwrap_or(trade.entry_time);
            equity_curve.push(EquityPoint { time: now, equity });
            closed_so_far.push(trade.clone());

            let daily_headroom = RuleEngine::remaining_daily_loss(equity, day_start_equity, self.spec.max_daily_loss);
            let max_headroom = RuleEngine::remaining_max_loss(equity, initial_balance, self.spec.max_total_loss);
            min_daily_headroom = min_daily_headroom.min(daily_headroom);
            min_max_headroom = min_max_headroom.min(max_headroom);
            if daily_headroom <= daily_buffer || max_headroom <= max_buffer {
                buffer_breaches += 1;
            }

            let mut state = crate::rule_engine::state::RuleState {
                now,
                equity,
                balance,
                day_start_equity,
                day_start_time,
                initial_balance,
                floating_pnl: 0.0,
                commission: 0.0,
                swap: 0.0,
                other_fees: 0.0,
                trades: closed_so_far.clone(),
                is_news_blackout: false,
                open_positions: 0,
                last_trade_time: None,
                stage_start_time: Some(stage_start_time),
                drawdown_start_time,
            };
            state.update_drawdown_start(self.spec.drawdown_limit_pct);
            drawdown_start_time = state.drawdown_start_time;

            let current_violations = self.engine.check_violation(&state);
            if !current_violations.is_empty() {
                violations.extend(current_violations.iter().map(|v| v.code.to_string()));
                return self.finalize_result(&state, equity_curve, violations, min_daily_headroom, min_max_headroom, buffer_breaches);
            }
        }

        let final_state = crate::rule_engine::state::RuleState {
            now,
            equity,
            balance,
            day_start_equity,
            day_start_time,
            initial_balance,
            floating_pnl: 0.0,
            commission: 0.0,
            swap: 0.0,
            other_fees: 0.0,
            trades: ordered,
            is_news_blackout: false,
            open_positions: 0,
            last_trade_time: None,
            stage_start_time: Some(stage_start_time),
            drawdown_start_time,
        };
        self.finalize_result(&final_state, equity_curve, violations, min_daily_headroom, min_max_headroom, buffer_breaches)
    }

    /// Ordered replay over price bars, applying signals at matching
    /// timestamps and marking any open position to market every bar. A
    /// single position at a time: an `open` signal is ignored while one is
    /// already open, and a `close` is ignored when none is open.
    pub fn simulate_signals(&self, bars: &[PriceBar], signals: &[Signal], initial_balance: f64) -> SimulationResult {
        if bars.is_empty() {
            return self.simulate_trades(&[], initial_balance);
        }

        let zone = self.spec.zone();
        let fee = self.spec.fee_schedule("SIM");

        let mut ordered_bars = bars.to_vec();
        ordered_bars.sort_by_key(|b| b.time);
        let mut ordered_signals = signals.to_vec();
        ordered_signals.sort_by_key(|s| s.time);

        let mut balance = initial_balance;
        let mut commission_paid = 0.0;
        let mut swap_paid = 0.0;
        let mut open_position: Option<OpenSimPosition> = None;
        let mut closed_trades: Vec<Trade> = Vec::new();

        let first_time = ordered_bars[0].time;
        let mut day_start_time = day_start_for(first_time, zone);
        let mut day_start_equity = initial_balance;
        let daily_buffer = self.spec.effective_daily_buffer();
        let max_buffer = self.spec.effective_max_buffer();
        let mut min_daily_headroom =
            RuleEngine::remaining_daily_loss(initial_balance, day_start_equity, self.spec.max_daily_loss);
        let mut min_max_headroom =
            RuleEngine::remaining_max_loss(initial_balance, initial_balance, self.spec.max_total_loss);
        let mut buffer_breaches = 0u32;
        let mut equity_curve = vec![EquityPoint { time: first_time, equity: initial_balance }];
        let mut drawdown_start_time = None;
        let mut sig_idx = 0usize;

        let commission_half = fee.commission_per_lot_round_trip / 2.0;

        for bar in &ordered_bars {
            if needs_day_reset(bar.time, day_start_time, zone) {
                if let Some(position) = &open_position {
                    swap_paid += fee.swap_per_lot_per_day * position.size;
                }
                day_start_time = day_start_for(bar.time, zone);
                day_start_equity = balance;
            }

            while sig_idx < ordered_signals.len() && ordered_signals[sig_idx].time == bar.time {
                let signal = ordered_signals[sig_idx];
                sig_idx += 1;

                let price = signal.price.unwrap_or(match signal.side {
                    Side::Buy => bar.ask,
                    Side::Sell => bar.bid,
                });

                match (signal.action, &open_position) {
                    (SignalAction::Open, None) => {
                        commission_paid += commission_half * signal.size;
                        open_position = Some(OpenSimPosition {
                            entry_time: signal.time,
                            side: signal.side,
                            size: signal.size,
                            entry_price: price,
                            symbol: "SIM".to_string(),
                        });
                    }
                    (SignalAction::Close, Some(position)) => {
                        let direction = if position.side == Side::Buy { 1.0 } else { -1.0 };
                        let profit = (price - position.entry_price) * position.size * direction;
                        balance += profit;
                        commission_paid += commission_half * position.size;
                        closed_trades.push(Trade {
                            symbol: position.symbol.clone(),
                            entry_time: position.entry_time,
                            exit_time: Some(signal.time),
                            entry_price: position.entry_price,
                            exit_price: Some(price),
                            profit,
                        });
                        open_position = None;
                    }
                    _ => {}
                }
            }

            let floating_pnl = match &open_position {
                None => 0.0,
                Some(position) => {
                    let mark = match (self.spec.mtm_mode, position.side) {
                        (MtMMode::WorstOhlc, Side::Buy) => bar.low,
                        (MtMMode::WorstOhlc, Side::Sell) => bar.high,
                        (MtMMode::Mid, Side::Buy) => bar.bid,
                        (MtMMode::Mid, Side::Sell) => bar.ask,
                    };
                    let direction = if position.side == Side::Buy { 1.0 } else { -1.0 };
                    (mark - position.entry_price) * position.size * direction
                }
            };
            let equity = balance + floating_pnl - commission_paid - swap_paid;
            equity_curve.push(EquityPoint { time: bar.time, equity });

            let daily_headroom = RuleEngine::remaining_daily_loss(equity, day_start_equity, self.spec.max_daily_loss);
            let max_headroom = RuleEngine::remaining_max_loss(equity, initial_balance, self.spec.max_total_loss);
            min_daily_headroom = min_daily_headroom.min(daily_headroom);
            min_max_headroom = min_max_headroom.min(max_headroom);
            if daily_headroom <= daily_buffer || max_headroom <= max_buffer {
                buffer_breaches += 1;
            }

            let mut state = crate::rule_engine::state::RuleState {
                now: bar.time,
                equity,
                balance,
                day_start_equity,
                day_start_time,
                initial_balance,
                floating_pnl,
                commission: commission_paid,
                swap: swap_paid,
                other_fees: 0.0,
                trades: closed_trades.clone(),
                is_news_blackout: false,
                open_positions: open_position.is_some() as u32,
                last_trade_time: None,
                stage_start_time: Some(first_time),
                drawdown_start_time,
            };
            state.update_drawdown_start(self.spec.drawdown_limit_pct);
            drawdown_start_time = state.drawdown_start_time;

            let violations = self.engine.check_violation(&state);
            if !violations.is_empty() {
                let codes = violations.iter().map(|v| v.code.to_string()).collect();
                return self.finalize_result(&state, equity_curve, codes, min_daily_headroom, min_max_headroom, buffer_breaches);
            }
        }

        let final_bar = ordered_bars.last().unwrap();
        let final_state = crate::rule_engine::state::RuleState {
            now: final_bar.time,
            equity: equity_curve.last().unwrap().equity,
            balance,
            day_start_equity,
            day_start_time,
            initial_balance,
            floating_pnl: 0.0,
            commission: commission_paid,
            swap: swap_paid,
            other_fees: 0.0,
            trades: closed_trades,
            is_news_blackout: false,
            open_positions: open_position.is_some() as u32,
            last_trade_time: None,
            stage_start_time: Some(first_time),
            drawdown_start_time,
        };
        self.finalize_result(&final_state, equity_curve, Vec::new(), min_daily_headroom, min_max_headroom, buffer_breaches)
    }

    /// Re-runs `simulate_trades` after subtracting independently uniform-drawn
    /// slippage and spread from each trade's profit.
    pub fn run_monte_carlo(&self, trades: &[Trade], runs: u32, config: MonteCarloConfig, initial_balance: f64) -> Vec<SimulationResult> {
        let mut rng = rand::thread_rng();
        (0..runs)
            .map(|_| {
                let adjusted: Vec<Trade> = trades
                    .iter()
                    .map(|trade| {
                        let slippage = rng.gen_range(config.slippage_range.0..=config.slippage_range.1);
                        let spread = rng.gen_range(config.spread_range.0..=config.spread_range.1);
                        Trade {
                            profit: trade.profit - slippage - spread,
                            ..trade.clone()
                        }
                    })
                    .collect();
                self.simulate_trades(&adjusted, initial_balance)
            })
            .collect()
    }

    fn finalize_result(
        &self,
        state: &crate::rule_engine::state::RuleState,
        equity_curve: Vec<EquityPoint>,
        violations: Vec<String>,
        min_daily_headroom: f64,
        min_max_headroom: f64,
        buffer_breaches: u32,
    ) -> SimulationResult {
        let trading_days = trading_day_count(&state.trades, self.spec.zone());
        let profit = state.effective_equity() - state.initial_balance;
        let target = self.spec.profit_target();
        let target_progress = if self.spec.stage == AccountStage::Funded {
            0.0
        } else if target == 0.0 {
            0.0
        } else {
            profit / target
        };

        let (passed, failure_reason) = self.evaluate_pass(state, &violations, trading_days);
        SimulationResult {
            equity_curve,
            passed,
            failure_reason,
            trading_days,
            target_progress,
            violations,
            min_daily_headroom,
            min_max_headroom,
            buffer_breaches,
        }
    }

    fn evaluate_pass(
        &self,
        state: &crate::rule_engine::state::RuleState,
        violations: &[String],
        trading_days: u32,
    ) -> (bool, Option<String>) {
        if let Some(first) = violations.first() {
            return (false, Some(format!("Violation: {first}")));
        }

        if self.spec.stage == AccountStage::Funded {
            return (true, None);
        }

        let profit = state.effective_equity() - state.initial_balance;
        let target = self.spec.profit_target();
        if profit < target {
            return (false, Some("Profit target not reached".to_string()));
        }
        if trading_days < self.spec.min_trading_days {
            return (false, Some("Minimum trading days not reached".to_string()));
        }

        (true, None)
    }
}
