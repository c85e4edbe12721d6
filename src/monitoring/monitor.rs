// =============================================================================
// Monitor — routes governor/execution events to a Notifier under a fixed
// event taxonomy
// =============================================================================

use std::sync::Arc;

use super::notifier::Notifier;

pub struct Monitor {
    notifier: Arc<dyn Notifier>,
}

impl Monitor {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub fn rule_buffer_breach(&self, which: &str, remaining: f64) {
        self.notifier
            .notify("RULE_BUFFER", &format!("{which} buffer reached, remaining {remaining:.2}"));
    }

    pub fn flatten_trigger(&self, reason: &str) {
        self.notifier.notify("FLATTEN", reason);
    }

    pub fn disconnect(&self, reason: &str) {
        self.notifier.notify("DISCONNECT", reason);
    }

    pub fn inactivity_warning(&self, message: &str) {
        self.notifier.notify("INACTIVITY", message);
    }

    pub fn safe_mode(&self, reason: &str) {
        self.notifier.notify("SAFE_MODE", reason);
    }
}
