pub mod context;
pub mod drift;
pub mod metrics;
pub mod safe_mode;
pub mod service;

pub use context::{compute_config_hash, create_run_context, RunContext};
pub use drift::DriftTracker;
pub use metrics::{DailyMetrics, DailyMetricsTracker};
pub use safe_mode::{SafeModeLatch, SafeModeState};
pub use service::{AsyncService, AsyncServiceConfig, DailyBundleEmitter, NoopBundleEmitter};
