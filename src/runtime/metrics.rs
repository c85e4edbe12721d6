// =============================================================================
// Daily Metrics — per-civil-day trade counters for dashboards and audits
// =============================================================================
//
// Grounded in the teacher's `RiskEngine` daily counters (trades, wins,
// losses) rather than in anything from the original Python project, which
// tracks this informally through its audit log instead of a dedicated
// counter type. Rolls over on the same civil-day boundary the rule engine
// uses, via `rule_engine::time`.
// =============================================================================

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use serde::Serialize;

use crate::rule_engine::time::day_start_for;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DailyMetrics {
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub pnl: f64,
    pub orders_placed: u32,
    pub orders_rejected: u32,
}

struct Inner {
    day_start: Option<DateTime<Utc>>,
    metrics: DailyMetrics,
}

/// One instance shared across the async service's tasks. Rolls its own
/// counters over at civil-day boundaries, independent of `RuleState`'s own
/// rollover (metrics outlive rule violations; they are purely descriptive).
pub struct DailyMetricsTracker {
    zone: Tz,
    inner: RwLock<Inner>,
}

impl DailyMetricsTracker {
    pub fn new(zone: Tz) -> Self {
        Self {
            zone,
            inner: RwLock::new(Inner {
                day_start: None,
                metrics: DailyMetrics::default(),
            }),
        }
    }

    fn roll_if_needed(&self, now: DateTime<Utc>, inner: &mut Inner) {
        let day_start = day_start_for(now, self.zone);
        if inner.day_start.map(|d| day_start > d).unwrap_or(true) {
            inner.day_start = Some(day_start);
            inner.metrics = DailyMetrics::default();
        }
    }

    pub fn record_trade(&self, now: DateTime<Utc>, pnl: f64) {
        let mut inner = self.inner.write();
        self.roll_if_needed(now, &mut inner);
        inner.metrics.trades += 1;
        inner.metrics.pnl += pnl;
        if pnl >= 0.0 {
            inner.metrics.wins += 1;
        } else {
            inner.metrics.losses += 1;
        }
    }

    pub fn record_order_placed(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.write();
        self.roll_if_needed(now, &mut inner);
        inner.metrics.orders_placed += 1;
    }

    pub fn record_order_rejected(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.write();
        self.roll_if_needed(now, &mut inner);
        inner.metrics.orders_rejected += 1;
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> DailyMetrics {
        let mut inner = self.inner.write();
        self.roll_if_needed(now, &mut inner);
        inner.metrics.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn prague() -> Tz {
        "Europe/Prague".parse().unwrap()
    }

    #[test]
    fn record_trade_updates_wins_and_losses() {
        let tracker = DailyMetricsTracker::new(prague());
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        tracker.record_trade(now, 100.0);
        tracker.record_trade(now, -50.0);
        let snapshot = tracker.snapshot(now);
        assert_eq!(snapshot.trades, 2);
        assert_eq!(snapshot.wins, 1);
        assert_eq!(snapshot.losses, 1);
        assert_eq!(snapshot.pnl, 50.0);
    }

    #[test]
    fn counters_reset_on_new_civil_day() {
        let tracker = DailyMetricsTracker::new(prague());
        let day1 = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        tracker.record_trade(day1, 100.0);
        let day2 = Utc.with_ymd_and_hms(2024, 6, 2, 10, 0, 0).unwrap();
        let snapshot = tracker.snapshot(day2);
        assert_eq!(snapshot.trades, 0);
    }
}
