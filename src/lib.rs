// =============================================================================
// FTMO-style prop-firm evaluation supervisor — risk + execution kernel
// =============================================================================
//
// Five layers, leaves first: time/calendar primitives, the rule engine (pure
// functions over an immutable spec and a mutable account snapshot), the risk
// governor (a latched state machine wrapping the engine), the execution
// engine (journaled, idempotent order submission with reconciliation and
// drift tracking), the async service loop (four cooperative periodic tasks),
// and the evaluation simulator (the same rule engine replayed offline).
//
// =============================================================================

pub mod app_state;
pub mod error;
pub mod monitoring;
pub mod runtime;
pub mod runtime_config;
pub mod rule_engine;
pub mod risk;
pub mod execution;
pub mod simulator;
pub mod strategy;
pub mod types;

pub use error::SupervisorError;
