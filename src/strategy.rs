// =============================================================================
// Strategy interface — the kernel's only contact point with trade ideas
// =============================================================================
//
// Concrete strategies (mean-reversion, momentum, breakout) are out of
// scope; this trait is the seam a host implementation plugs into. The bar
// loop calls `on_market_data` once per closed bar, then `generate_intents`
// to collect whatever `OrderIntent`s the strategy wants executed this tick.
// =============================================================================

use crate::execution::models::OrderIntent;
use crate::simulator::PriceBar;

/// A strategy observes bars and, on its own schedule, proposes order
/// intents. It never talks to the broker or the governor directly — the
/// bar loop is the only caller, and it is always the governor's
/// `pre_trade` that decides whether an intent is actually submitted.
pub trait Strategy: Send + Sync {
    fn on_market_data(&mut self, bar: &PriceBar);
    fn generate_intents(&mut self) -> Vec<OrderIntent>;
}

/// A strategy that never proposes anything. Used by the core's own tests
/// and as a placeholder until a host wires in a real strategy.
#[derive(Debug, Default)]
pub struct NoopStrategy;

impl Strategy for NoopStrategy {
    fn on_market_data(&mut self, _bar: &PriceBar) {}

    fn generate_intents(&mut self) -> Vec<OrderIntent> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn noop_strategy_never_produces_intents() {
        let mut strategy = NoopStrategy;
        strategy.on_market_data(&PriceBar {
            time: Utc::now(),
            bid: 1.1,
            ask: 1.1002,
            low: 1.099,
            high: 1.101,
        });
        assert!(strategy.generate_intents().is_empty());
    }
}
