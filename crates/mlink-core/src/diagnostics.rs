//! Point-in-time connectivity and credential checks.
//!
//! Diagnostics are read-only and bounded: every check carries its own
//! timeout so a hung probe can never stall the health monitor's tick.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::constants::PROBE_TIMEOUT;
use crate::store::SessionStore;

/// Configuration for diagnostics runs.
#[derive(Debug, Clone)]
pub struct DiagnosticsConfig {
    /// `host:port` of the remote service used for the reachability probe.
    pub endpoint: String,
    /// Per-check timeout.
    pub probe_timeout: Duration,
}

impl DiagnosticsConfig {
    /// Create a config probing the given endpoint with the default timeout.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    /// Set the per-check timeout.
    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }
}

/// Outcome of a diagnostics run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsResult {
    /// The remote endpoint accepted a TCP connection within the timeout.
    pub reachable: bool,
    /// A valid credential blob exists on disk.
    pub credentials_present: bool,
    /// Human-readable findings, one per check.
    pub details: Vec<String>,
}

/// Runs reachability and credential-presence checks on demand.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    config: DiagnosticsConfig,
    store: SessionStore,
}

impl Diagnostics {
    /// Create a diagnostics runner over the given store.
    pub fn new(config: DiagnosticsConfig, store: SessionStore) -> Self {
        Self { config, store }
    }

    /// Run all checks. Never fails and never mutates state; problems show
    /// up as `false` flags plus a detail line.
    pub async fn run(&self) -> DiagnosticsResult {
        let mut details = Vec::new();

        let reachable = match timeout(
            self.config.probe_timeout,
            TcpStream::connect(&self.config.endpoint),
        )
        .await
        {
            Ok(Ok(_)) => {
                details.push(format!("{} reachable", self.config.endpoint));
                true
            }
            Ok(Err(e)) => {
                details.push(format!("probe to {} failed: {e}", self.config.endpoint));
                false
            }
            Err(_) => {
                details.push(format!(
                    "probe to {} timed out after {:?}",
                    self.config.endpoint, self.config.probe_timeout
                ));
                false
            }
        };

        let credentials_present = match self.store.load_credentials() {
            Ok(Some(loaded)) if loaded.valid => {
                details.push("credentials present and valid".into());
                true
            }
            Ok(Some(_)) => {
                details.push("credentials present but invalid".into());
                false
            }
            Ok(None) => {
                details.push("no credentials on disk".into());
                false
            }
            Err(e) => {
                details.push(format!("credential check failed: {e}"));
                false
            }
        };

        debug!(reachable, credentials_present, "diagnostics run complete");
        DiagnosticsResult {
            reachable,
            credentials_present,
            details,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
