//! Notifier double that records alerts for assertions.

use std::sync::Mutex;

use mlink_core::notify::{Alert, AlertKind, Notifier};

/// Records every alert it receives.
#[derive(Debug, Default)]
pub struct SpyNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl SpyNotifier {
    /// Create an empty spy.
    pub fn new() -> Self {
        Self::default()
    }

    /// All alerts received so far, in order.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of alerts received.
    pub fn count(&self) -> usize {
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Kinds of alerts received, in order.
    pub fn kinds(&self) -> Vec<AlertKind> {
        self.alerts()
            .into_iter()
            .map(|alert| alert.kind)
            .collect()
    }
}

impl Notifier for SpyNotifier {
    fn notify(&self, alert: Alert) {
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(alert);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_alerts_in_order() {
        let spy = SpyNotifier::new();
        spy.notify(Alert {
            kind: AlertKind::RepeatedFailures,
            message: "first".into(),
            context: serde_json::Value::Null,
        });
        spy.notify(Alert {
            kind: AlertKind::ConnectionFailed,
            message: "second".into(),
            context: serde_json::Value::Null,
        });

        assert_eq!(spy.count(), 2);
        assert_eq!(
            spy.kinds(),
            vec![AlertKind::RepeatedFailures, AlertKind::ConnectionFailed]
        );
    }
}
