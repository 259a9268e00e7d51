//! Transport abstraction consumed by the supervisor.
//!
//! The actual session protocol (handshake, encryption, framing) lives
//! outside this crate. The supervisor only ever sees an opaque handle plus
//! a finite stream of lifecycle events, so every transport implementation
//! funnels through the same dispatch loop.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;

/// Durable session secrets produced by the transport layer.
///
/// Opaque to this crate apart from the identity-field validity probe in the
/// session store. Debug output never reveals the contents.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBlob {
    bytes: Bytes,
}

impl CredentialBlob {
    /// Wrap raw credential bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Raw credential bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the blob in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the blob is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for CredentialBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBlob")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl From<Vec<u8>> for CredentialBlob {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for CredentialBlob {
    fn from(bytes: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(bytes))
    }
}

/// Lifecycle events emitted by a transport session.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The session completed its handshake and is usable.
    Opened,
    /// The session closed with a raw status code from the remote service.
    Closed {
        /// Raw close code as reported by the transport.
        code: u16,
        /// Human-readable close message.
        message: String,
    },
    /// The transport rotated its durable credentials; the new blob must be
    /// persisted before the process exits.
    CredentialsUpdated(CredentialBlob),
}

/// Options passed to a transport connect call.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Give up on the handshake after this long.
    pub connect_timeout: Duration,
    /// The caller deliberately dropped cached credentials; the transport
    /// should run a fresh pairing cycle instead of resuming.
    pub fresh_session: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: crate::constants::DEFAULT_CONNECT_TIMEOUT,
            fresh_session: false,
        }
    }
}

/// A live transport session.
///
/// The supervisor issues exactly two commands: it is the only component
/// allowed to disconnect, and it drops the handle when the session dies.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Tear down the session. Idempotent.
    async fn disconnect(&self);
}

/// Factory for transport sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a session, optionally resuming from cached credentials.
    ///
    /// Returns the handle plus the event stream for this session. The
    /// stream ends when the session is gone; a `Closed` event is expected
    /// as the final item on any non-deliberate teardown.
    async fn connect(
        &self,
        credentials: Option<CredentialBlob>,
        options: &ConnectOptions,
    ) -> Result<(Box<dyn TransportHandle>, mpsc::Receiver<TransportEvent>)>;
}

// =============================================================================
// Tests
// =============================================================================
