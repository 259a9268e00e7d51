//! Mock transport for testing without a real network.
//!
//! Each connect call consumes one [`ConnectScript`] describing whether the
//! attempt succeeds and which events the session emits on its own. Tests
//! can inject further events into the live session at any point.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use mlink_core::error::{Error, Result};
use mlink_core::transport::{
    ConnectOptions, CredentialBlob, Transport, TransportEvent, TransportHandle,
};

/// Scripted behavior for a single connect call.
pub struct ConnectScript {
    outcome: Option<Error>,
    initial_events: Vec<TransportEvent>,
}

impl ConnectScript {
    /// Connect succeeds and the session immediately reports open.
    pub fn accept() -> Self {
        Self {
            outcome: None,
            initial_events: vec![TransportEvent::Opened],
        }
    }

    /// Connect succeeds but the session emits nothing on its own.
    pub fn accept_silent() -> Self {
        Self {
            outcome: None,
            initial_events: Vec::new(),
        }
    }

    /// Connect fails with the given error.
    pub fn reject(error: Error) -> Self {
        Self {
            outcome: Some(error),
            initial_events: Vec::new(),
        }
    }

    /// Append an event the session emits right after connecting.
    pub fn then_emit(mut self, event: TransportEvent) -> Self {
        self.initial_events.push(event);
        self
    }
}

struct MockHandle {
    disconnects: Arc<AtomicU32>,
}

#[async_trait]
impl TransportHandle for MockHandle {
    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory transport driven by scripts and manual event injection.
///
/// With no scripts queued, every connect is accepted and reports open,
/// which keeps simple tests short.
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<VecDeque<ConnectScript>>,
    connect_count: AtomicU32,
    seen_credentials: Mutex<Vec<Option<CredentialBlob>>>,
    current_tx: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    disconnects: Arc<AtomicU32>,
}

impl MockTransport {
    /// Create a transport that accepts every connect.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a script for the next connect call.
    pub fn push_script(&self, script: ConnectScript) {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(script);
    }

    /// How many connect calls have been made.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// How many times a session handle was disconnected.
    pub fn disconnect_count(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Credentials passed to each connect call, in order.
    pub fn seen_credentials(&self) -> Vec<Option<CredentialBlob>> {
        self.seen_credentials
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Inject an event into the most recent session.
    pub async fn emit(&self, event: TransportEvent) {
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

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        credentials: Option<CredentialBlob>,
        _options: &ConnectOptions,
    ) -> Result<(Box<dyn TransportHandle>, mpsc::Receiver<TransportEvent>)> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        self.seen_credentials
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(credentials);

        let script = self
            .scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(ConnectScript::accept);

        if let Some(error) = script.outcome {
            return Err(error);
        }

        let (tx, rx) = mpsc::channel(32);
        for event in script.initial_events {
            let _ = tx.send(event).await;
        }
        *self
            .current_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(tx);

        let handle = MockHandle {
            disconnects: Arc::clone(&self.disconnects),
        };
        Ok((Box::new(handle), rx))
    }
}

// =============================================================================
// Tests
// =============================================================================
