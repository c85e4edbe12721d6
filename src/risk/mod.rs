pub mod governor;

pub use governor::{RiskDecision, RiskGovernor, RuleHeadroom};
