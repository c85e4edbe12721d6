// =============================================================================
// Rule Engine — pure, deterministic compliance evaluation
// =============================================================================
//
// Layering: `time` holds civil-day/midnight arithmetic with no knowledge of
// trading; `spec` is the frozen per-run configuration; `state` is the single
// mutable account snapshot; `engine` is pure functions over spec + state.
// Nothing in this module performs I/O or holds a lock — the governor (see
// `crate::risk::governor`) is the only caller that owns mutable access.
// =============================================================================

pub mod engine;
pub mod spec;
pub mod state;
pub mod time;

pub use engine::{RuleEngine, Violation};
pub use spec::RuleSpec;
pub use state::{RuleState, Trade};
