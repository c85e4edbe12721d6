pub mod evaluator;
pub mod gate;
pub mod models;

pub use evaluator::EvaluationSimulator;
pub use gate::{assess_gate, GateResult};
pub use models::{
    EquityPoint, MonteCarloConfig, OpenSimPosition, PriceBar, Signal, SignalAction, SimulationResult,
};
