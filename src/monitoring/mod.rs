pub mod audit;
pub mod monitor;
pub mod notifier;
pub mod status;

pub use audit::AuditLog;
pub use monitor::Monitor;
pub use notifier::{LogNotifier, Notifier};
pub use status::{build_runtime_status, RuleHeadroom, RuntimeStatus};
