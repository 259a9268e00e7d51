//! Error types for mlink-core.

use thiserror::Error;

/// Main error type for mlink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from underlying system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport layer failure (connect refused, stream reset, DNS, ...).
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Connection was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// Remote service rate-limited the session.
    #[error("rate limited by remote service")]
    RateLimited,

    /// Remote service logged this session out. A fresh credential issuance
    /// is required out of band; reconnecting will not help.
    #[error("logged out by remote service")]
    LoggedOut,

    /// Remote service rejected the cached credentials.
    #[error("authentication rejected")]
    AuthRejected,

    /// Another client took over the session.
    #[error("session replaced by another client")]
    SessionReplaced,

    /// Backing credential storage exists but could not be read.
    #[error("credential read error: {message}")]
    CredentialRead { message: String },

    /// A backup failed checksum verification at restore time.
    #[error("backup integrity check failed: stored {stored}, computed {computed}")]
    Integrity { stored: String, computed: String },

    /// No backup matched the restore request.
    #[error("no matching backup available")]
    BackupNotFound { target: Option<u64> },

    /// Invalid state transition.
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },
}

impl Error {
    /// Returns true if this error is transient and reconnection may help.
    ///
    /// Transient errors include network failures where the remote session
    /// may still be alive and a retry with backoff could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. }
                | Error::ConnectionClosed
                | Error::Timeout
                | Error::RateLimited
                | Error::Io(_)
        )
    }

    /// Returns true if this error is fatal for the current credentials.
    ///
    /// Fatal errors mean the session is unrecoverable as-is: the remote
    /// side revoked or replaced the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::LoggedOut | Error::AuthRejected | Error::SessionReplaced
        )
    }
}

/// Convenience result type for mlink operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let err = Error::Transport {
            message: "stream reset".into(),
        };
        assert_eq!(err.to_string(), "transport error: stream reset");
    }

    #[test]
    fn error_display_integrity() {
        let err = Error::Integrity {
            stored: "abcd".into(),
            computed: "ef01".into(),
        };
        assert_eq!(
            err.to_string(),
            "backup integrity check failed: stored abcd, computed ef01"
        );
    }

    #[test]
    fn error_display_backup_not_found() {
        assert_eq!(
            Error::BackupNotFound { target: Some(42) }.to_string(),
            "no matching backup available"
        );
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn transient_errors() {
        assert!(Error::Transport {
            message: "connection lost".into()
        }
        .is_transient());
        assert!(Error::ConnectionClosed.is_transient());
        assert!(Error::Timeout.is_transient());
        assert!(Error::RateLimited.is_transient());

        assert!(!Error::LoggedOut.is_transient());
        assert!(!Error::CredentialRead {
            message: "bad".into()
        }
        .is_transient());
    }

    #[test]
    fn fatal_errors() {
        assert!(Error::LoggedOut.is_fatal());
        assert!(Error::AuthRejected.is_fatal());
        assert!(Error::SessionReplaced.is_fatal());

        assert!(!Error::Timeout.is_fatal());
        assert!(!Error::ConnectionClosed.is_fatal());
        assert!(!Error::Integrity {
            stored: "a".into(),
            computed: "b".into()
        }
        .is_fatal());
    }

    #[test]
    fn storage_errors_are_neither_transient_nor_fatal() {
        // Storage errors surface to the caller instead of feeding the
        // retry classification.
        let read = Error::CredentialRead {
            message: "permission denied".into(),
        };
        assert!(!read.is_transient());
        assert!(!read.is_fatal());
    }
}
