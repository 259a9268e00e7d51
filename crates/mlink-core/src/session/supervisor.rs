//! Top-level connection supervisor.
//!
//! Owns the transport lifecycle and the state machine. All reconnect logic
//! is serialized through this type: transport events arrive on a single
//! dispatch loop, at most one retry timer is pending at a time, and
//! `stop()` cancels everything deterministically.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::constants::{
    AUTH_FAILURE_THRESHOLD, BACKUP_INTERVAL, DEFAULT_BACKOFF_FACTOR, DEFAULT_BASE_DELAY,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY, ESCALATION_THRESHOLD,
    HEALTH_TICK_INTERVAL, MAX_RECORDED_ERRORS,
};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::health::{HealthConfig, HealthMonitor, HealthRecord};
use crate::notify::{Alert, AlertKind, Notifier};
use crate::session::backoff::ReconnectPolicy;
use crate::session::state::{ConnectionState, DisconnectReason};
use crate::store::SessionStore;
use crate::transport::{ConnectOptions, Transport, TransportEvent, TransportHandle};

/// Supervisor tunables.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Base delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Multiplier applied to the delay per scheduled retry.
    pub backoff_factor: f64,
    /// Ceiling on the reconnect delay.
    pub max_delay: Duration,
    /// Maximum scheduled retries before giving up.
    pub max_attempts: u32,
    /// Timeout for a single transport connect.
    pub connect_timeout: Duration,
    /// Consecutive auth rejections tolerated before `Failed`.
    pub auth_failure_threshold: u32,
    /// Consecutive failures before the notifier is alerted.
    pub escalation_threshold: u32,
    /// Interval between health monitor ticks.
    pub health_tick_interval: Duration,
    /// Interval between periodic backups while connected.
    pub backup_interval: Duration,
    /// Health monitor tunables.
    pub health: HealthConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            auth_failure_threshold: AUTH_FAILURE_THRESHOLD,
            escalation_threshold: ESCALATION_THRESHOLD,
            health_tick_interval: HEALTH_TICK_INTERVAL,
            backup_interval: BACKUP_INTERVAL,
            health: HealthConfig::default(),
        }
    }
}

impl SupervisorConfig {
    /// Set the base reconnect delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the reconnect delay ceiling.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the retry ceiling.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the health tick interval.
    pub fn with_health_tick_interval(mut self, interval: Duration) -> Self {
        self.health_tick_interval = interval;
        self
    }

    /// Set the health monitor tunables.
    pub fn with_health(mut self, health: HealthConfig) -> Self {
        self.health = health;
        self
    }
}

/// Read-only status view polled by dashboards and CLIs.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Current state machine position.
    pub state: ConnectionState,
    /// Bounded health score.
    pub health_score: u8,
    /// Retries scheduled in the current failure episode.
    pub reconnect_attempts: u32,
    /// Seconds since the last successful open, if any.
    pub last_success_secs_ago: Option<u64>,
    /// Recent error strings, newest first.
    pub last_errors: Vec<String>,
    /// Whether the last health tick flagged staleness.
    pub stale: bool,
}

// Poison-tolerant lock helpers; a panicked writer must not wedge the
// supervisor.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// The connection resilience state machine.
///
/// One instance per session. All fields are instance state; multiple
/// supervisors (or tests) run independently. Call [`stop`]
/// (ConnectionSupervisor::stop) before dropping the last external handle,
/// otherwise the timer tasks keep the instance alive.
pub struct ConnectionSupervisor {
    transport: Arc<dyn Transport>,
    store: SessionStore,
    diagnostics: Diagnostics,
    notifier: Arc<dyn Notifier>,
    config: SupervisorConfig,

    state: RwLock<ConnectionState>,
    state_changed: Notify,
    policy: Mutex<ReconnectPolicy>,
    health: Mutex<HealthMonitor>,
    handle: Mutex<Option<Box<dyn TransportHandle>>>,

    /// Pending retry timer; at most one in flight.
    reconnect_timer: Mutex<Option<JoinHandle<()>>>,
    /// Set while a retry timer is pending; cleared when it fires or is
    /// canceled, so a failed attempt can schedule the next retry.
    retry_pending: AtomicBool,
    /// Event pumps and periodic timers, aborted on stop.
    tasks: Mutex<Vec<JoinHandle<()>>>,
    timers_started: AtomicBool,

    /// Next connect must bypass the cached blob.
    force_fresh: AtomicBool,
    /// Consecutive auth rejections / session replacements.
    auth_failures: AtomicU32,
    /// Session generation; events from superseded sessions are dropped.
    generation: AtomicU64,

    last_errors: Mutex<VecDeque<String>>,
}

impl ConnectionSupervisor {
    /// Create a stopped supervisor.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: SessionStore,
        diagnostics: Diagnostics,
        notifier: Arc<dyn Notifier>,
        config: SupervisorConfig,
    ) -> Arc<Self> {
        let policy = ReconnectPolicy::new(
            config.base_delay,
            config.backoff_factor,
            config.max_delay,
            config.max_attempts,
        );
        let health = HealthMonitor::new(config.health.clone());
        Arc::new(Self {
            transport,
            store,
            diagnostics,
            notifier,
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            state_changed: Notify::new(),
            policy: Mutex::new(policy),
            health: Mutex::new(health),
            handle: Mutex::new(None),
            reconnect_timer: Mutex::new(None),
            retry_pending: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            timers_started: AtomicBool::new(false),
            force_fresh: AtomicBool::new(false),
            auth_failures: AtomicU32::new(0),
            generation: AtomicU64::new(0),
            last_errors: Mutex::new(VecDeque::new()),
        })
    }

    /// Current state machine position.
    pub fn state(&self) -> ConnectionState {
        *read_lock(&self.state)
    }

    /// Immutable copy of the current health record.
    pub fn health_snapshot(&self) -> HealthRecord {
        lock(&self.health).snapshot()
    }

    /// Read-only status snapshot. Side-effect free.
    pub fn status(&self) -> StatusSnapshot {
        let health = lock(&self.health).snapshot();
        StatusSnapshot {
            state: self.state(),
            health_score: health.score,
            reconnect_attempts: lock(&self.policy).attempt(),
            last_success_secs_ago: health.last_success_at.map(|t| t.elapsed().as_secs()),
            last_errors: lock(&self.last_errors).iter().cloned().collect(),
            stale: health.stale,
        }
    }

    /// Wait until the supervisor reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState) {
        loop {
            let notified = self.state_changed.notified();
            if self.state() == target {
                return;
            }
            notified.await;
        }
    }

    /// Open the transport with the latest valid credentials.
    ///
    /// Idempotent: a no-op while already `Connecting` or `Connected`.
    /// Recovers from `Failed` when called with new credentials in place.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        {
            let state = self.state();
            if matches!(
                state,
                ConnectionState::Connecting | ConnectionState::Connected
            ) {
                debug!(%state, "start ignored, already active");
                return Ok(());
            }
        }
        // An explicit start supersedes any pending retry timer
        self.cancel_reconnect_timer();
        if !self.transition(ConnectionState::Connecting) {
            return Err(Error::InvalidState {
                expected: "disconnected, failed or reconnecting".into(),
                actual: self.state().to_string(),
            });
        }
        self.connect_once().await;
        Ok(())
    }

    /// Explicit user-initiated shutdown.
    ///
    /// Cancels the pending retry timer and the periodic timers, tears down
    /// the transport, and leaves the state machine `Disconnected`. No
    /// reconnect fires after this returns.
    pub async fn stop(&self, reason: &str) {
        info!(reason, "stopping supervisor");
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cancel_reconnect_timer();
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        self.timers_started.store(false, Ordering::SeqCst);
        let handle = lock(&self.handle).take();
        self.transition(ConnectionState::Disconnected);
        if let Some(handle) = handle {
            handle.disconnect().await;
        }
    }

    /// The transport completed its handshake.
    ///
    /// Resets the backoff policy and the auth-churn bookkeeping, restores
    /// full health, and snapshots the credentials.
    pub async fn report_open(self: &Arc<Self>) {
        {
            let state = self.state();
            if !matches!(
                state,
                ConnectionState::Connecting | ConnectionState::Reconnecting
            ) {
                warn!(%state, "ignoring open in unexpected state");
                return;
            }
        }
        if !self.transition(ConnectionState::Connected) {
            return;
        }
        lock(&self.policy).reset();
        self.force_fresh.store(false, Ordering::SeqCst);
        self.auth_failures.store(0, Ordering::SeqCst);
        lock(&self.health).on_transport_event(&TransportEvent::Opened);
        info!("connection open");
        if let Err(e) = self.store.backup() {
            warn!(error = %e, "post-open backup failed");
        }
        self.ensure_timers();
    }

    /// The transport closed with a raw status code.
    ///
    /// Classifies the code and either schedules a retry, forces a fresh
    /// credential cycle, or moves to `Failed`.
    pub async fn report_close(self: &Arc<Self>, code: u16, message: &str) {
        let reason = DisconnectReason::classify(code);
        info!(code, %reason, message, "transport closed");
        self.process_disconnect(reason, code, message).await;
    }

    /// Proactively cycle a connected session whose health degraded.
    ///
    /// No-op unless currently `Connected`.
    pub async fn force_reconnect(self: &Arc<Self>) {
        if self.state() != ConnectionState::Connected {
            return;
        }
        // Supersede the session so its event pump goes quiet
        self.generation.fetch_add(1, Ordering::SeqCst);
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            handle.disconnect().await;
        }
        self.record_error("health degraded, proactive reconnect".to_string());
        self.schedule_reconnect().await;
    }

    fn transition(&self, next: ConnectionState) -> bool {
        {
            let mut state = write_lock(&self.state);
            if *state == next {
                return true;
            }
            if !state.can_transition_to(next) {
                warn!(current = %*state, requested = %next, "ignoring illegal state transition");
                return false;
            }
            debug!(from = %*state, to = %next, "state transition");
            *state = next;
        }
        self.state_changed.notify_waiters();
        true
    }

    async fn connect_once(self: &Arc<Self>) {
        let fresh = self.force_fresh.load(Ordering::SeqCst);
        let credentials = if fresh {
            info!("bypassing cached credentials for a fresh session");
            None
        } else {
            match self.store.load_credentials() {
                Ok(Some(loaded)) if loaded.valid => Some(loaded.blob),
                Ok(Some(_)) => {
                    warn!("cached credentials invalid, requesting fresh session");
                    None
                }
                Ok(None) => None,
                Err(e) => {
                    warn!(error = %e, "credential load failed, requesting fresh session");
                    None
                }
            }
        };
        let options = ConnectOptions {
            connect_timeout: self.config.connect_timeout,
            fresh_session: credentials.is_none(),
        };

        match time::timeout(
            self.config.connect_timeout,
            self.transport.connect(credentials, &options),
        )
        .await
        {
            Ok(Ok((handle, events))) => {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                *lock(&self.handle) = Some(handle);
                self.spawn_event_pump(generation, events);
                debug!(generation, "transport session established, awaiting open");
            }
            Ok(Err(e)) => {
                warn!(error = %e, "connect failed");
                self.process_disconnect(reason_for_error(&e), 0, &e.to_string())
                    .await;
            }
            Err(_) => {
                warn!(timeout = ?self.config.connect_timeout, "connect timed out");
                self.process_disconnect(
                    DisconnectReason::Transient(408),
                    408,
                    "connect timed out",
                )
                .await;
            }
        }
    }

    fn spawn_event_pump(
        self: &Arc<Self>,
        generation: u64,
        mut events: mpsc::Receiver<TransportEvent>,
    ) {
        let supervisor = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if supervisor.generation.load(Ordering::SeqCst) != generation {
                    debug!(generation, "dropping event from a superseded session");
                    break;
                }
                match event {
                    TransportEvent::Opened => supervisor.report_open().await,
                    TransportEvent::Closed { code, message } => {
                        supervisor.report_close(code, &message).await;
                        break;
                    }
                    TransportEvent::CredentialsUpdated(blob) => {
                        lock(&supervisor.health).record_activity();
                        if let Err(e) = supervisor.store.save(&blob) {
                            warn!(error = %e, "failed to persist rotated credentials");
                        }
                    }
                }
            }
        });
        self.track_task(task);
    }

    /// Keep a task handle for `stop()` to abort, dropping handles of pumps
    /// that already ran to completion so the list stays bounded across
    /// reconnect cycles.
    fn track_task(&self, task: JoinHandle<()>) {
        let mut tasks = lock(&self.tasks);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    async fn process_disconnect(self: &Arc<Self>, reason: DisconnectReason, code: u16, message: &str) {
        {
            let state = self.state();
            if matches!(
                state,
                ConnectionState::Disconnected | ConnectionState::Failed
            ) {
                debug!(%state, %reason, "disconnect ignored in terminal state");
                return;
            }
        }
        // The session is gone either way
        *lock(&self.handle) = None;
        self.record_error(format!("{reason}: {message}"));

        let consecutive = {
            let mut health = lock(&self.health);
            health.on_transport_event(&TransportEvent::Closed {
                code,
                message: message.to_string(),
            });
            health.snapshot().consecutive_failures
        };
        if consecutive == self.config.escalation_threshold {
            self.notifier.notify(Alert {
                kind: AlertKind::RepeatedFailures,
                message: format!("{consecutive} consecutive connection failures"),
                context: serde_json::json!({
                    "reason": reason.to_string(),
                    "consecutive_failures": consecutive,
                }),
            });
        }

        if !reason.is_recoverable() {
            warn!(%reason, "session revoked by remote service");
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "failed to clear credentials after logout");
            }
            self.fail(reason);
            return;
        }

        if reason.requires_fresh_credentials() {
            self.force_fresh.store(true, Ordering::SeqCst);
            let churn = self.auth_failures.fetch_add(1, Ordering::SeqCst) + 1;
            if churn > self.config.auth_failure_threshold {
                warn!(churn, %reason, "credential churn exceeded threshold");
                self.notifier.notify(Alert {
                    kind: AlertKind::AuthChurn,
                    message: format!(
                        "{churn} consecutive credential rejections, giving up"
                    ),
                    context: serde_json::json!({
                        "reason": reason.to_string(),
                        "rejections": churn,
                    }),
                });
                self.fail(reason);
                return;
            }
        }

        if lock(&self.policy).exhausted() {
            warn!(attempts = lock(&self.policy).attempt(), "retry budget exhausted");
            self.fail(reason);
            return;
        }

        self.schedule_reconnect().await;
    }

    async fn schedule_reconnect(self: &Arc<Self>) {
        // Dedupe concurrent triggers; the flag drops when the timer fires,
        // so the timer task itself can schedule the next retry on failure.
        if self.retry_pending.swap(true, Ordering::SeqCst) {
            debug!("reconnect already scheduled");
            return;
        }
        if !self.transition(ConnectionState::Reconnecting) {
            self.retry_pending.store(false, Ordering::SeqCst);
            return;
        }
        let (delay, attempt) = {
            let mut policy = lock(&self.policy);
            let delay = policy.next_delay();
            (delay, policy.attempt())
        };
        info!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        let supervisor = Arc::clone(self);
        let timer = tokio::spawn(async move {
            time::sleep(delay).await;
            supervisor.retry_pending.store(false, Ordering::SeqCst);
            if supervisor.state() != ConnectionState::Reconnecting {
                return;
            }
            if supervisor.transition(ConnectionState::Connecting) {
                Arc::clone(&supervisor).connect_once_boxed().await;
            }
        });
        *lock(&self.reconnect_timer) = Some(timer);
    }

    /// Boxed re-entry point for the retry timer. The timer task calls back
    /// into `connect_once`, whose failure path schedules the next timer;
    /// boxing erases the otherwise self-referential future type.
    fn connect_once_boxed(self: Arc<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move { self.connect_once().await })
    }

    fn cancel_reconnect_timer(&self) {
        if let Some(timer) = lock(&self.reconnect_timer).take() {
            timer.abort();
        }
        self.retry_pending.store(false, Ordering::SeqCst);
    }

    fn fail(&self, reason: DisconnectReason) {
        self.cancel_reconnect_timer();
        self.transition(ConnectionState::Failed);
        let health = lock(&self.health).snapshot();
        self.notifier.notify(Alert {
            kind: AlertKind::ConnectionFailed,
            message: format!("connection failed: {reason}"),
            context: serde_json::json!({
                "reason": reason.to_string(),
                "consecutive_failures": health.consecutive_failures,
                "health_score": health.score,
            }),
        });
    }

    fn ensure_timers(self: &Arc<Self>) {
        if self.timers_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let supervisor = Arc::clone(self);
        let health_task = tokio::spawn(async move {
            let period = supervisor.config.health_tick_interval;
            let mut ticks = time::interval_at(time::Instant::now() + period, period);
            ticks.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                supervisor.health_tick().await;
            }
        });

        let supervisor = Arc::clone(self);
        let backup_task = tokio::spawn(async move {
            let period = supervisor.config.backup_interval;
            let mut ticks = time::interval_at(time::Instant::now() + period, period);
            ticks.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                if supervisor.state() == ConnectionState::Connected {
                    if let Err(e) = supervisor.store.backup() {
                        warn!(error = %e, "periodic backup failed");
                    }
                }
            }
        });

        self.track_task(health_task);
        self.track_task(backup_task);
    }

    #[cfg(test)]
    fn tracked_tasks(&self) -> usize {
        lock(&self.tasks).len()
    }

    async fn health_tick(self: &Arc<Self>) {
        let state = self.state();
        if matches!(
            state,
            ConnectionState::Disconnected | ConnectionState::Failed
        ) {
            return;
        }
        let diagnostics = if lock(&self.health).diagnostics_due() {
            Some(self.diagnostics.run().await)
        } else {
            None
        };
        let force = {
            let mut health = lock(&self.health);
            health.tick(state, diagnostics.as_ref());
            health.should_force_reconnect(state)
        };
        if force {
            let score = lock(&self.health).snapshot().score;
            warn!(score, "health degraded below threshold, cycling connection");
            self.force_reconnect().await;
        }
    }

    fn record_error(&self, entry: String) {
        let mut errors = lock(&self.last_errors);
        errors.push_front(entry);
        errors.truncate(MAX_RECORDED_ERRORS);
    }
}

/// Map a local connect error onto the disconnect taxonomy.
///
/// Timeouts borrow the remote service's 408 code so the status snapshot
/// reads uniformly; other local failures carry no code.
fn reason_for_error(error: &Error) -> DisconnectReason {
    match error {
        Error::LoggedOut => DisconnectReason::LoggedOut,
        Error::AuthRejected => DisconnectReason::AuthRejected,
        Error::SessionReplaced => DisconnectReason::SessionReplaced,
        Error::RateLimited => DisconnectReason::RateLimited,
        Error::Timeout => DisconnectReason::Transient(408),
        _ => DisconnectReason::Transient(0),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_constants() {
        let config = SupervisorConfig::default();
        assert_eq!(config.base_delay, DEFAULT_BASE_DELAY);
        assert_eq!(config.backoff_factor, DEFAULT_BACKOFF_FACTOR);
        assert_eq!(config.max_delay, DEFAULT_MAX_DELAY);
        assert_eq!(config.escalation_threshold, ESCALATION_THRESHOLD);
    }

    #[test]
    fn config_builders() {
        let config = SupervisorConfig::default()
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(30))
            .with_backoff_factor(1.5)
            .with_max_attempts(7)
            .with_connect_timeout(Duration::from_secs(10));
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.backoff_factor, 1.5);
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn error_to_reason_mapping() {
        assert_eq!(
            reason_for_error(&Error::LoggedOut),
            DisconnectReason::LoggedOut
        );
        assert_eq!(
            reason_for_error(&Error::AuthRejected),
            DisconnectReason::AuthRejected
        );
        assert_eq!(
            reason_for_error(&Error::Timeout),
            DisconnectReason::Transient(408)
        );
        assert_eq!(
            reason_for_error(&Error::ConnectionClosed),
            DisconnectReason::Transient(0)
        );
    }

    #[test]
    fn status_snapshot_serializes() {
        let snapshot = StatusSnapshot {
            state: ConnectionState::Reconnecting,
            health_score: 60,
            reconnect_attempts: 2,
            last_success_secs_ago: Some(12),
            last_errors: vec!["transient(408): timeout".into()],
            stale: false,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "reconnecting");
        assert_eq!(json["health_score"], 60);
        assert_eq!(json["reconnect_attempts"], 2);
    }

    use crate::diagnostics::DiagnosticsConfig;
    use crate::notify::LogNotifier;
    use crate::transport::CredentialBlob;

    /// Local stand-in for `mlink_test_utils::MockTransport`. The lib-test
    /// build compiles its own copy of this crate, so the shared mock's
    /// `Transport` impl targets a different `Transport` type and cannot be
    /// used here; every connect is accepted and reports open.
    #[derive(Default)]
    struct MockTransport {
        current_tx: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    }

    impl MockTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Inject an event into the most recent session.
        async fn emit(&self, event: TransportEvent) {
            let tx = self
                .current_tx
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            if let Some(tx) = tx {
                let _ = tx.send(event).await;
            }
        }
    }

    struct MockHandle;

    #[async_trait::async_trait]
    impl TransportHandle for MockHandle {
        async fn disconnect(&self) {}
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        async fn connect(
            &self,
            _credentials: Option<CredentialBlob>,
            _options: &ConnectOptions,
        ) -> Result<(Box<dyn TransportHandle>, mpsc::Receiver<TransportEvent>)> {
            let (tx, rx) = mpsc::channel(32);
            let _ = tx.send(TransportEvent::Opened).await;
            *self
                .current_tx
                .lock()
                .unwrap_or_else(|e| e.into_inner()) = Some(tx);
            Ok((Box::new(MockHandle), rx))
        }
    }

    fn test_supervisor(
        transport: Arc<MockTransport>,
        dir: &tempfile::TempDir,
    ) -> Arc<ConnectionSupervisor> {
        let store = SessionStore::new(dir.path());
        let diagnostics = Diagnostics::new(DiagnosticsConfig::new("127.0.0.1:9"), store.clone());
        let mut config = SupervisorConfig::default()
            .with_base_delay(Duration::from_millis(10))
            .with_health_tick_interval(Duration::from_secs(3600));
        config.backup_interval = Duration::from_secs(3600);
        let transport_dyn: Arc<dyn Transport> = transport;
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        ConnectionSupervisor::new(transport_dyn, store, diagnostics, notifier, config)
    }

    #[tokio::test(start_paused = true)]
    async fn finished_event_pumps_are_pruned() {
        let dir = tempfile::TempDir::new().unwrap();
        let transport = MockTransport::new();
        let supervisor = test_supervisor(transport.clone(), &dir);

        supervisor.start().await.unwrap();
        supervisor.wait_for_state(ConnectionState::Connected).await;
        for _ in 0..5 {
            transport
                .emit(TransportEvent::Closed {
                    code: 503,
                    message: "restart".into(),
                })
                .await;
            supervisor
                .wait_for_state(ConnectionState::Reconnecting)
                .await;
            supervisor.wait_for_state(ConnectionState::Connected).await;
        }

        // Two periodic timers plus at most the live pump and one not yet
        // reaped; five close/reopen cycles must not stack five pump handles.
        assert!(supervisor.tracked_tasks() <= 4);
        supervisor.stop("done").await;
    }
}
