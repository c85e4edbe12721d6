// =============================================================================
// Request Throttle — per-day and per-minute rate limiting
// =============================================================================

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;

use crate::rule_engine::time::day_start_for;
use crate::types::RequestKind;

#[derive(Debug, Clone, Copy)]
pub struct ThrottleDecision {
    pub allow: bool,
    pub reason: &'static str,
}

struct Inner {
    day_start: Option<DateTime<Utc>>,
    daily_count: u32,
    mod_minute_start: Option<DateTime<Utc>>,
    mod_count: u32,
    last_request_time: Option<DateTime<Utc>>,
}

/// Three counters guarded by a single lock: daily request count (reset at
/// local midnight), modify/cancel-per-minute count (reset on a rolling
/// 60s window), and the last request's timestamp.
pub struct RequestThrottle {
    max_requests_per_day: u32,
    max_modifications_per_minute: u32,
    min_seconds_between_requests: i64,
    zone: Tz,
    inner: Mutex<Inner>,
}

impl RequestThrottle {
    pub fn new(
        max_requests_per_day: u32,
        max_modifications_per_minute: u32,
        min_seconds_between_requests: i64,
        zone: Tz,
    ) -> Self {
        Self {
            max_requests_per_day,
            max_modifications_per_minute,
            min_seconds_between_requests,
            zone,
            inner: Mutex::new(Inner {
                day_start: None,
                daily_count: 0,
                mod_minute_start: None,
                mod_count: 0,
                last_request_time: None,
            }),
        }
    }

    pub fn allow(&self, kind: RequestKind, now: DateTime<Utc>) -> ThrottleDecision {
        let mut s = self.inner.lock();

        let day_start = day_start_for(now, self.zone);
        if s.day_start.map(|d| day_start > d).unwrap_or(true) {
            s.day_start = Some(day_start);
            s.daily_count = 0;
        }

        if self.max_requests_per_day > 0 && s.daily_count >= self.max_requests_per_day {
            return ThrottleDecision {
                allow: false,
                reason: "Daily request cap reached",
            };
        }

        if self.min_seconds_between_requests > 0 {
            if let Some(last) = s.last_request_time {
                if (now - last).num_seconds() < self.min_seconds_between_requests {
                    return ThrottleDecision {
                        allow: false,
                        reason: "Request rate too high",
                    };
                }
            }
        }

        let is_modify_like = matches!(kind, RequestKind::Modify | RequestKind::Cancel);
        if is_modify_like && self.max_modifications_per_minute > 0 {
            let window_expired = s
                .mod_minute_start
                .map(|start| now - start >= Duration::minutes(1))
                .unwrap_or(true);
            if window_expired {
                s.mod_minute_start = Some(now);
                s.mod_count = 0;
            }
            if s.mod_count >= self.max_modifications_per_minute {
                return ThrottleDecision {
                    allow: false,
                    reason: "Modification rate cap reached",
                };
            }
        }

        s.daily_count += 1;
        s.last_request_time = Some(now);
        if is_modify_like {
            s.mod_count += 1;
        }

        ThrottleDecision {
            allow: true,
            reason: "Allowed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn prague() -> Tz {
        "Europe/Prague".parse().unwrap()
    }

    #[test]
    fn denies_after_daily_cap() {
        let throttle = RequestThrottle::new(2, 60, 0, prague());
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        assert!(throttle.allow(RequestKind::Place, now).allow);
        assert!(throttle.allow(RequestKind::Place, now).allow);
        assert!(!throttle.allow(RequestKind::Place, now).allow);
    }

    #[test]
    fn denies_when_min_interval_not_elapsed() {
        let throttle = RequestThrottle::new(1000, 60, 10, prague());
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        assert!(throttle.allow(RequestKind::Place, now).allow);
        let soon = now + Duration::seconds(5);
        assert!(!throttle.allow(RequestKind::Place, soon).allow);
        let later = now + Duration::seconds(11);
        assert!(throttle.allow(RequestKind::Place, later).allow);
    }

    #[test]
    fn modification_cap_only_applies_to_modify_and_cancel() {
        let throttle = RequestThrottle::new(1000, 1, 0, prague());
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        assert!(throttle.allow(RequestKind::Place, now).allow);
        assert!(throttle.allow(RequestKind::Place, now).allow);
        assert!(throttle.allow(RequestKind::Modify, now).allow);
        assert!(!throttle.allow(RequestKind::Cancel, now).allow);
    }

    #[test]
    fn daily_counter_resets_on_new_civil_day() {
        let throttle = RequestThrottle::new(1, 60, 0, prague());
        let day1 = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        assert!(throttle.allow(RequestKind::Place, day1).allow);
        assert!(!throttle.allow(RequestKind::Place, day1).allow);
        let day2 = Utc.with_ymd_and_hms(2024, 6, 2, 10, 0, 0).unwrap();
        assert!(throttle.allow(RequestKind::Place, day2).allow);
    }
}
