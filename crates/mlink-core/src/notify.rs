//! Escalation alerts for human operators.
//!
//! The supervisor is silent during routine reconnection; only persistent
//! failure crosses this seam. The delivery mechanism (chat message, pager,
//! webhook) lives outside this crate behind the [`Notifier`] trait.

use tracing::warn;

/// Category of an escalation alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// Consecutive failures crossed the escalation threshold.
    RepeatedFailures,
    /// The supervisor reached the terminal `Failed` state.
    ConnectionFailed,
    /// Repeated auth rejections / session replacements; the cached
    /// credentials are being refused faster than they can be refreshed.
    AuthChurn,
}

/// An alert destined for human escalation.
#[derive(Debug, Clone)]
pub struct Alert {
    /// What class of problem this is.
    pub kind: AlertKind,
    /// Operator-facing summary.
    pub message: String,
    /// Structured context (last disconnect reason, failure counts, ...).
    pub context: serde_json::Value,
}

/// Receiver of supervisor-emitted alerts.
pub trait Notifier: Send + Sync {
    /// Deliver an alert. Must not block the caller for long; implementations
    /// that talk to the network should hand off to their own task.
    fn notify(&self, alert: Alert);
}

/// Default notifier that records alerts on the log stream.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, alert: Alert) {
        warn!(
            kind = ?alert.kind,
            context = %alert.context,
            "{}",
            alert.message
        );
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_notifier_accepts_alerts() {
        let notifier = LogNotifier;
        notifier.notify(Alert {
            kind: AlertKind::RepeatedFailures,
            message: "5 consecutive failures".into(),
            context: serde_json::json!({ "consecutive_failures": 5 }),
        });
    }
}
