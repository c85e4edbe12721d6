// =============================================================================
// Promotion gate — aggregate pass/fail across a batch of simulation runs
// =============================================================================

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::models::SimulationResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub pass_rate: f64,
    pub average_trading_days: f64,
    pub average_target_progress: f64,
    pub buffer_breach_runs: u32,
    pub min_daily_headroom: f64,
    pub min_max_headroom: f64,
    pub failures: HashMap<String, u32>,
    pub meets_threshold: bool,
}

/// Aggregates a batch of `SimulationResult`s (typically a Monte Carlo batch)
/// into a single pass/fail verdict. An empty `results` slice produces an
/// all-zero result with `meets_threshold = false` — there is nothing to
/// promote on.
pub fn assess_gate(results: &[SimulationResult], min_pass_rate: f64, max_buffer_breach_runs: u32) -> GateResult {
    if results.is_empty() {
        return GateResult {
            pass_rate: 0.0,
            average_trading_days: 0.0,
            average_target_progress: 0.0,
            buffer_breach_runs: 0,
            min_daily_headroom: 0.0,
            min_max_headroom: 0.0,
            failures: HashMap::new(),
            meets_threshold: false,
        };
    }

    let total = results.len() as f64;
    let passed = results.iter().filter(|r| r.passed).count() as f64;
    let pass_rate = passed / total;

    let average_trading_days = results.iter().map(|r| r.trading_days as f64).sum::<f64>() / total;
    let average_target_progress = results.iter().map(|r| r.target_progress).sum::<f64>() / total;

    let buffer_breach_runs = results.iter().filter(|r| r.buffer_breaches > 0).count() as u32;

    let min_daily_headroom = results
        .iter()
        .map(|r| r.min_daily_headroom)
        .fold(f64::INFINITY, f64::min);
    let min_max_headroom = results
        .iter()
        .map(|r| r.min_max_headroom)
        .fold(f64::INFINITY, f64::min);

    let mut failures: HashMap<String, u32> = HashMap::new();
    for result in results {
        if !result.passed {
            let reason = result
                .violations
                .first()
                .cloned()
                .or_else(|| result.failure_reason.clone())
                .unwrap_or_else(|| "unknown".to_string());
            *failures.entry(reason).or_insert(0) += 1;
        }
    }

    let meets_threshold = pass_rate >= min_pass_rate && buffer_breach_runs <= max_buffer_breach_runs;

    GateResult {
        pass_rate,
        average_trading_days,
        average_target_progress,
        buffer_breach_runs,
        min_daily_headroom,
        min_max_headroom,
        failures,
        meets_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result(passed: bool, buffer_breaches: u32, violation: Option<&str>) -> SimulationResult {
        SimulationResult {
            equity_curve: vec![super::super::models::EquityPoint { time: Utc::now(), equity: 100_000.0 }],
            passed,
            failure_reason: violation.map(|v| v.to_string()),
            trading_days: 3,
            target_progress: 1.0,
            violations: violation.map(|v| vec![v.to_string()]).unwrap_or_default(),
            min_daily_headroom: 500.0,
            min_max_headroom: 1_000.0,
            buffer_breaches,
        }
    }

    #[test]
    fn empty_results_produce_zeroed_gate_that_fails_threshold() {
        let gate = assess_gate(&[], 0.9, 0);
        assert_eq!(gate.pass_rate, 0.0);
        assert!(!gate.meets_threshold);
        assert!(gate.failures.is_empty());
    }

    #[test]
    fn pass_rate_reflects_fraction_of_passing_runs() {
        let results = vec![result(true, 0, None), result(true, 0, None), result(false, 0, Some("DAILY_LOSS_LIMIT"))];
        let gate = assess_gate(&results, 0.5, 0);
        assert!((gate.pass_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(gate.failures.get("DAILY_LOSS_LIMIT"), Some(&1));
        assert!(gate.meets_threshold);
    }

    #[test]
    fn buffer_breach_runs_above_cap_fails_threshold() {
        let results = vec![result(true, 1, None), result(true, 2, None)];
        let gate = assess_gate(&results, 0.5, 0);
        assert_eq!(gate.buffer_breach_runs, 2);
        assert!(!gate.meets_threshold);
    }
}
