// =============================================================================
// Supervisor error taxonomy
// =============================================================================
//
// Only `SupervisorError::Configuration` aborts the process. Every other
// variant is caught at the task boundary it occurs in, audit-logged, and
// routed into the safe-mode latch where the error table calls for it — see
// the async service loop for where each variant is produced and handled.
// =============================================================================

use thiserror::Error;

/// The single error type returned by every fallible operation in the kernel.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Config hash mismatch, missing required field, unknown enum. Fatal:
    /// surfaced to the operator, aborts startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A rule violation observed by the engine; the governor always folds
    /// this into a latched `Disabled` state, never returns it bare to a
    /// caller outside the governor.
    #[error("rule violation: {0}")]
    RuleViolation(String),

    /// Returned by `governor.pre_trade`; a non-exceptional outcome.
    #[error("pre-trade denied: {0}")]
    PreTradeDenial(String),

    /// Short-lived denial from the throttle; does not enable safe-mode.
    #[error("throttled: {0}")]
    ThrottleBlock(String),

    /// A duplicate order fingerprint was suppressed; only an error when the
    /// engine is configured with `duplicate_block = true`.
    #[error("duplicate order: {0}")]
    DuplicateOrder(String),

    /// Broker ping failure or missing account snapshot.
    #[error("broker transient failure: {0}")]
    BrokerTransient(String),

    /// The broker reported an order status of `rejected`.
    #[error("broker rejected order: {0}")]
    BrokerReject(String),

    /// A broker/journal mismatch aged past `drift_unresolved_seconds`.
    #[error("drift unresolved: {0}")]
    DriftUnresolved(String),

    /// Any unhandled failure inside a periodic task body.
    #[error("service error: {0}")]
    ServiceError(#[from] anyhow::Error),

    /// A journal insert against an already-existing key. Treated as
    /// idempotent success everywhere except where the distinction itself is
    /// being tested.
    #[error("integrity: {0}")]
    Integrity(String),
}
