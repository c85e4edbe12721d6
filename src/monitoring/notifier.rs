// =============================================================================
// Notifier — alert delivery backends
// =============================================================================
//
// Kept synchronous so it can be called from the governor's own synchronous
// decision path (`evaluate_state`, `pre_trade`) without requiring a tokio
// runtime to be entered there. A backend that genuinely needs to await I/O
// (an HTTP webhook, say) is expected to queue the send rather than block.
// =============================================================================

use tracing::warn;

pub trait Notifier: Send + Sync {
    fn notify(&self, event: &str, message: &str);
}

/// Routes alerts through `tracing` at `warn` level. A host deployment wires
/// in a real backend (email, webhook, chat) by implementing `Notifier`
/// itself; this crate ships only the always-available fallback.
pub struct LogNotifier {
    prefix: String,
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new("[ftmo-supervisor]")
    }
}

impl LogNotifier {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, event: &str, message: &str) {
        warn!(prefix = %self.prefix, event, message, "alert");
    }
}
