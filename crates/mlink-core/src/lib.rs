//! mlink-core: Connection resilience and session lifecycle management.
//!
//! This crate provides:
//! - The connection supervisor state machine and reconnect policy
//! - Health monitoring with periodic diagnostics
//! - Credential persistence with checksummed backups
//! - Transport and notifier abstractions
//! - Logging setup

pub mod constants;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod logging;
pub mod notify;
pub mod session;
pub mod store;
pub mod transport;

#[cfg(test)]
mod proptests;

pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat};
pub use session::{
    ConnectionState, ConnectionSupervisor, DisconnectReason, StatusSnapshot, SupervisorConfig,
};
pub use store::SessionStore;
pub use transport::{CredentialBlob, Transport, TransportEvent, TransportHandle};
