pub mod broker;
pub mod engine;
pub mod journal;
pub mod models;
pub mod throttle;

pub use broker::{Broker, PaperBroker};
pub use engine::{DuplicateConfig, ExecutionEngine};
pub use journal::OrderJournal;
pub use models::{
    AccountSnapshot, BrokerOrder, ExecutionOrder, JournalEntry, OrderIntent, Position,
    ReconcileReport, SymbolSpec,
};
pub use throttle::{RequestThrottle, ThrottleDecision};
