// =============================================================================
// RuleSpec — immutable per-run compliance configuration
// =============================================================================

use std::collections::HashMap;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::types::{AccountStage, FundedMode, MidnightPolicy, MtMMode};

/// Commission and swap costs for a single symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub commission_per_lot_round_trip: f64,
    pub swap_per_lot_per_day: f64,
}

/// News policy derived from stage and funded mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsPolicy {
    Apply,
    Ignore,
}

/// Frozen configuration of a single evaluation run. Created once; never
/// mutated for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub account_size: f64,
    pub max_daily_loss: f64,
    pub max_total_loss: f64,
    pub challenge_target: f64,
    pub verification_target: f64,
    pub min_trading_days: u32,

    /// IANA zone name, e.g. `"Europe/Prague"`. Parsed once at construction;
    /// the parsed `Tz` is what every time-arithmetic call actually uses.
    pub timezone: String,

    pub daily_loss_stop_pct: f64,
    pub max_loss_stop_pct: f64,

    pub midnight_policy: MidnightPolicy,
    pub midnight_window_minutes: i64,
    pub midnight_buffer_multiplier: f64,

    pub max_days_without_trade: u32,
    pub inactivity_warning_days: u32,
    pub drawdown_limit_pct: f64,
    pub drawdown_days_limit: u32,
    pub drawdown_warning_days: u32,

    pub stage: AccountStage,
    pub funded_mode: FundedMode,
    pub strategy_is_legit: bool,

    pub mtm_mode: MtMMode,

    #[serde(default)]
    pub fee_schedules: HashMap<String, FeeSchedule>,

    /// Floor applied to the buffer computation so it never collapses to a
    /// point value at `stop_pct == 1.0`. Present in the source deployment as
    /// an implicit `0.0`; kept explicit and configurable here.
    #[serde(default)]
    pub money_floor_buffer: f64,
}

impl RuleSpec {
    /// Parsed IANA timezone. Panics only if `timezone` was not validated at
    /// load time — `runtime_config::load_rule_spec` validates it before a
    /// `RuleSpec` is ever constructed.
    pub fn zone(&self) -> Tz {
        self.timezone
            .parse()
            .unwrap_or_else(|_| panic!("invalid IANA timezone: {}", self.timezone))
    }

    pub fn fee_schedule(&self, symbol: &str) -> FeeSchedule {
        self.fee_schedules
            .get(symbol)
            .copied()
            .unwrap_or(FeeSchedule {
                commission_per_lot_round_trip: 0.0,
                swap_per_lot_per_day: 0.0,
            })
    }

    /// Money target for the current stage; `0.0` once funded.
    pub fn profit_target(&self) -> f64 {
        match self.stage {
            AccountStage::Challenge => self.challenge_target,
            AccountStage::Verification => self.verification_target,
            AccountStage::Funded => 0.0,
        }
    }

    pub fn effective_daily_buffer(&self) -> f64 {
        (self.max_daily_loss * (1.0 - self.daily_loss_stop_pct)).max(self.money_floor_buffer)
    }

    pub fn effective_max_buffer(&self) -> f64 {
        (self.max_total_loss * (1.0 - self.max_loss_stop_pct)).max(self.money_floor_buffer)
    }

    pub fn midnight_daily_buffer(&self) -> f64 {
        self.effective_daily_buffer() * self.midnight_buffer_multiplier.max(1.0)
    }

    pub fn midnight_max_buffer(&self) -> f64 {
        self.effective_max_buffer() * self.midnight_buffer_multiplier.max(1.0)
    }

    /// Whether the news blackout is enforced at all for this spec: only
    /// `funded` accounts running in `standard` mode.
    pub fn news_policy(&self) -> NewsPolicy {
        if self.stage == AccountStage::Funded && self.funded_mode == FundedMode::Standard {
            NewsPolicy::Apply
        } else {
            NewsPolicy::Ignore
        }
    }
}
