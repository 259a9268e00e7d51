//! Connection health tracking.
//!
//! The monitor owns a bounded health score summarizing recent reliability.
//! Transport events and periodic ticks move the score; the supervisor reads
//! `should_force_reconnect` to decide when to proactively cycle a session
//! that looks alive but has degraded.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::constants::{
    CLOSE_PENALTY, DIAGNOSTICS_EVERY_N_TICKS, FORCE_RECONNECT_THRESHOLD, MAX_HEALTH_SCORE,
    MISSING_CREDENTIALS_CONNECTING_PENALTY, MISSING_CREDENTIALS_PENALTY, STALENESS_THRESHOLD,
    STALE_PENALTY, UNREACHABLE_PENALTY,
};
use crate::diagnostics::DiagnosticsResult;
use crate::session::ConnectionState;
use crate::transport::TransportEvent;

/// Tunables for the health monitor.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Penalty per transport close.
    pub close_penalty: u8,
    /// Penalty per stale tick while connected.
    pub stale_penalty: u8,
    /// Penalty when the reachability probe fails.
    pub unreachable_penalty: u8,
    /// Penalty when credentials are missing or invalid.
    pub missing_credentials_penalty: u8,
    /// Reduced credentials penalty while legitimately connecting.
    pub missing_credentials_connecting_penalty: u8,
    /// Inactivity window after which a connected session is stale.
    pub staleness_threshold: Duration,
    /// Score below which a connected session should be cycled.
    pub force_reconnect_threshold: u8,
    /// Diagnostics run on every Nth tick.
    pub diagnostics_every_n_ticks: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            close_penalty: CLOSE_PENALTY,
            stale_penalty: STALE_PENALTY,
            unreachable_penalty: UNREACHABLE_PENALTY,
            missing_credentials_penalty: MISSING_CREDENTIALS_PENALTY,
            missing_credentials_connecting_penalty: MISSING_CREDENTIALS_CONNECTING_PENALTY,
            staleness_threshold: STALENESS_THRESHOLD,
            force_reconnect_threshold: FORCE_RECONNECT_THRESHOLD,
            diagnostics_every_n_ticks: DIAGNOSTICS_EVERY_N_TICKS,
        }
    }
}

impl HealthConfig {
    /// Set the staleness window.
    pub fn with_staleness_threshold(mut self, threshold: Duration) -> Self {
        self.staleness_threshold = threshold;
        self
    }

    /// Set the force-reconnect score threshold.
    pub fn with_force_reconnect_threshold(mut self, threshold: u8) -> Self {
        self.force_reconnect_threshold = threshold;
        self
    }
}

/// Point-in-time view of connection health.
///
/// Snapshot-only outside the monitor; all mutation happens through the
/// monitor's event handlers and tick.
#[derive(Debug, Clone)]
pub struct HealthRecord {
    /// Bounded reliability score, always within `[0, 100]`.
    pub score: u8,
    /// Closes since the last successful open.
    pub consecutive_failures: u32,
    /// When the session last opened successfully.
    pub last_success_at: Option<Instant>,
    /// When the session last closed.
    pub last_error_at: Option<Instant>,
    /// Result of the most recent diagnostics run.
    pub last_diagnostics: Option<DiagnosticsResult>,
    /// Whether the last tick flagged the session as stale.
    pub stale: bool,
}

impl HealthRecord {
    fn new() -> Self {
        Self {
            score: MAX_HEALTH_SCORE,
            consecutive_failures: 0,
            last_success_at: None,
            last_error_at: None,
            last_diagnostics: None,
            stale: false,
        }
    }
}

/// Owns the health score and the staleness/diagnostics bookkeeping.
#[derive(Debug)]
pub struct HealthMonitor {
    config: HealthConfig,
    record: HealthRecord,
    last_activity_at: Option<Instant>,
    ticks: u64,
}

impl HealthMonitor {
    /// Create a monitor with the given tunables, starting at full score.
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            record: HealthRecord::new(),
            last_activity_at: None,
            ticks: 0,
        }
    }

    /// Fold a transport lifecycle event into the score.
    pub fn on_transport_event(&mut self, event: &TransportEvent) {
        match event {
            TransportEvent::Opened => {
                self.record.score = MAX_HEALTH_SCORE;
                self.record.consecutive_failures = 0;
                self.record.last_success_at = Some(Instant::now());
                self.record.stale = false;
                self.record_activity();
            }
            TransportEvent::Closed { code, .. } => {
                self.penalize(self.config.close_penalty);
                self.record.consecutive_failures += 1;
                self.record.last_error_at = Some(Instant::now());
                debug!(
                    code,
                    score = self.record.score,
                    consecutive_failures = self.record.consecutive_failures,
                    "close folded into health score"
                );
            }
            TransportEvent::CredentialsUpdated(_) => {
                self.record_activity();
            }
        }
    }

    /// Note traffic on the session; staleness measures time since this.
    pub fn record_activity(&mut self) {
        self.last_activity_at = Some(Instant::now());
    }

    /// Whether the next tick is one of the every-Nth diagnostics ticks.
    pub fn diagnostics_due(&self) -> bool {
        (self.ticks + 1) % self.config.diagnostics_every_n_ticks == 0
    }

    /// Periodic tick. Applies the staleness penalty while connected and
    /// folds in a diagnostics result when one was collected. Returns the
    /// staleness verdict for this tick.
    pub fn tick(
        &mut self,
        state: ConnectionState,
        diagnostics: Option<&DiagnosticsResult>,
    ) -> bool {
        self.ticks += 1;

        let mut stale = false;
        if state == ConnectionState::Connected {
            if let Some(at) = self.last_activity_at {
                if at.elapsed() > self.config.staleness_threshold {
                    self.penalize(self.config.stale_penalty);
                    stale = true;
                    debug!(
                        idle_secs = at.elapsed().as_secs(),
                        score = self.record.score,
                        "connected session is stale"
                    );
                }
            }
        }
        self.record.stale = stale;

        if let Some(result) = diagnostics {
            if !result.reachable {
                self.penalize(self.config.unreachable_penalty);
            }
            if !result.credentials_present {
                // A first connect legitimately has no blob yet
                let penalty = if state == ConnectionState::Connecting {
                    self.config.missing_credentials_connecting_penalty
                } else {
                    self.config.missing_credentials_penalty
                };
                self.penalize(penalty);
            }
            self.record.last_diagnostics = Some(result.clone());
        }

        trace!(tick = self.ticks, score = self.record.score, stale, "health tick");
        stale
    }

    /// Immutable copy of the current record.
    pub fn snapshot(&self) -> HealthRecord {
        self.record.clone()
    }

    /// True when the score dropped below the threshold while connected.
    ///
    /// Pure read; a single stale tick never forces a reconnect by itself,
    /// only the threshold crossing does.
    pub fn should_force_reconnect(&self, state: ConnectionState) -> bool {
        state == ConnectionState::Connected
            && self.record.score < self.config.force_reconnect_threshold
    }

    fn penalize(&mut self, penalty: u8) {
        // Saturating on both ends keeps the score in [0, 100]
        self.record.score = self.record.score.saturating_sub(penalty).min(MAX_HEALTH_SCORE);
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(code: u16) -> TransportEvent {
        TransportEvent::Closed {
            code,
            message: "test".into(),
        }
    }

    #[test]
    fn opened_resets_score_and_failures() {
        let mut monitor = HealthMonitor::default();
        monitor.on_transport_event(&closed(408));
        monitor.on_transport_event(&closed(408));
        assert_eq!(monitor.snapshot().consecutive_failures, 2);
        assert_eq!(monitor.snapshot().score, 60);

        monitor.on_transport_event(&TransportEvent::Opened);
        let record = monitor.snapshot();
        assert_eq!(record.score, 100);
        assert_eq!(record.consecutive_failures, 0);
        assert!(record.last_success_at.is_some());
    }

    #[test]
    fn score_never_goes_negative() {
        let mut monitor = HealthMonitor::default();
        for _ in 0..10 {
            monitor.on_transport_event(&closed(503));
        }
        assert_eq!(monitor.snapshot().score, 0);
        assert_eq!(monitor.snapshot().consecutive_failures, 10);
    }

    #[test]
    fn stale_tick_penalizes_only_while_connected() {
        let config = HealthConfig::default().with_staleness_threshold(Duration::ZERO);
        let mut monitor = HealthMonitor::new(config);
        monitor.record_activity();

        let stale = monitor.tick(ConnectionState::Reconnecting, None);
        assert!(!stale);
        assert_eq!(monitor.snapshot().score, 100);

        std::thread::sleep(Duration::from_millis(2));
        let stale = monitor.tick(ConnectionState::Connected, None);
        assert!(stale);
        assert_eq!(monitor.snapshot().score, 90);
    }

    #[test]
    fn single_stale_tick_does_not_force_reconnect() {
        let config = HealthConfig::default().with_staleness_threshold(Duration::ZERO);
        let mut monitor = HealthMonitor::new(config);
        monitor.record_activity();
        std::thread::sleep(Duration::from_millis(2));
        monitor.tick(ConnectionState::Connected, None);

        assert!(monitor.snapshot().stale);
        assert!(!monitor.should_force_reconnect(ConnectionState::Connected));
    }

    #[test]
    fn diagnostics_failure_penalties() {
        let mut monitor = HealthMonitor::default();
        let result = DiagnosticsResult {
            reachable: false,
            credentials_present: false,
            details: vec![],
        };

        monitor.tick(ConnectionState::Connected, Some(&result));
        // 100 - 25 (unreachable) - 15 (missing credentials)
        assert_eq!(monitor.snapshot().score, 60);
        assert_eq!(monitor.snapshot().last_diagnostics, Some(result));
    }

    #[test]
    fn missing_credentials_penalty_is_softer_while_connecting() {
        let mut monitor = HealthMonitor::default();
        let result = DiagnosticsResult {
            reachable: true,
            credentials_present: false,
            details: vec![],
        };

        monitor.tick(ConnectionState::Connecting, Some(&result));
        assert_eq!(monitor.snapshot().score, 95);
    }

    #[test]
    fn force_reconnect_requires_connected_state() {
        let mut monitor = HealthMonitor::default();
        for _ in 0..3 {
            monitor.on_transport_event(&closed(503));
        }
        assert_eq!(monitor.snapshot().score, 40);

        assert!(monitor.should_force_reconnect(ConnectionState::Connected));
        assert!(!monitor.should_force_reconnect(ConnectionState::Reconnecting));
        assert!(!monitor.should_force_reconnect(ConnectionState::Disconnected));
    }

    #[test]
    fn diagnostics_due_every_nth_tick() {
        let mut monitor = HealthMonitor::default();
        let mut due_ticks = Vec::new();
        for tick in 1..=10u64 {
            if monitor.diagnostics_due() {
                due_ticks.push(tick);
            }
            monitor.tick(ConnectionState::Connected, None);
        }
        assert_eq!(due_ticks, vec![5, 10]);
    }
}
