//! Connection state machine types and disconnect classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Supervisor connection status.
///
/// Exactly one state is active at a time and [`can_transition_to`]
/// (ConnectionState::can_transition_to) is the single source of truth for
/// which edges exist. `Failed` is terminal until an external `start()` with
/// new credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected and not trying to be.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Fully connected and operational.
    Connected,
    /// Lost the connection, a retry timer is pending.
    Reconnecting,
    /// Retries exhausted or the session was revoked; awaiting external
    /// intervention.
    Failed,
}

impl ConnectionState {
    /// Check if this state represents an active session effort.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::Connected
                | ConnectionState::Reconnecting
        )
    }

    /// Whether moving to `next` follows a legal edge.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (*self, next) {
            // stop() is legal from anywhere
            (_, Disconnected) => true,
            // start() and the retry timer firing
            (Disconnected | Failed | Reconnecting, Connecting) => true,
            // reportOpen()
            (Connecting | Reconnecting, Connected) => true,
            // recoverable close
            (Connecting | Connected, Reconnecting) => true,
            // fatal close or exhausted retries
            (Connecting | Connected | Reconnecting, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why the transport closed, derived from the raw status code.
///
/// The mapping follows the remote service's close-code vocabulary: 401 is
/// a logout, 403 an auth rejection, 440 a takeover by another client, 429
/// rate limiting; 408/428/500/503/515 are restarts and outages the same
/// credentials survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Recoverable network-level failure; retry with backoff.
    Transient(u16),
    /// Cached credentials were rejected; retry with a fresh pairing cycle.
    AuthRejected,
    /// Another client took over the session; retry with a fresh pairing
    /// cycle.
    SessionReplaced,
    /// Remote service revoked the session. Terminal.
    LoggedOut,
    /// Remote service asked us to slow down; retry with backoff.
    RateLimited,
    /// Unrecognized code; treated as recoverable.
    Unknown(u16),
}

impl DisconnectReason {
    /// Classify a raw close code.
    pub fn classify(code: u16) -> Self {
        match code {
            401 => DisconnectReason::LoggedOut,
            403 => DisconnectReason::AuthRejected,
            440 => DisconnectReason::SessionReplaced,
            429 => DisconnectReason::RateLimited,
            408 | 428 | 500 | 503 | 515 => DisconnectReason::Transient(code),
            other => DisconnectReason::Unknown(other),
        }
    }

    /// Whether reconnection can ever help.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DisconnectReason::LoggedOut)
    }

    /// Whether the next connect must bypass the cached credential blob.
    pub fn requires_fresh_credentials(&self) -> bool {
        matches!(
            self,
            DisconnectReason::AuthRejected | DisconnectReason::SessionReplaced
        )
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Transient(code) => write!(f, "transient({code})"),
            DisconnectReason::AuthRejected => f.write_str("auth_rejected"),
            DisconnectReason::SessionReplaced => f.write_str("session_replaced"),
            DisconnectReason::LoggedOut => f.write_str("logged_out"),
            DisconnectReason::RateLimited => f.write_str("rate_limited"),
            DisconnectReason::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
