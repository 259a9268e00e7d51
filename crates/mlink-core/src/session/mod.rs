//! Session lifecycle management.
//!
//! This module provides:
//! - The connection state machine and disconnect classification
//! - The exponential backoff policy
//! - The top-level supervisor tying transport, health and storage together

mod backoff;
mod state;
mod supervisor;

pub use backoff::ReconnectPolicy;
pub use state::{ConnectionState, DisconnectReason};
pub use supervisor::{ConnectionSupervisor, StatusSnapshot, SupervisorConfig};
