//! Policy and timing constants for mlink.

use std::time::Duration;

// =============================================================================
// Reconnection Constants
// =============================================================================

/// Base delay before the first reconnect attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);

/// Multiplier applied to the delay per scheduled retry.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Ceiling on the reconnect delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);

/// Maximum scheduled retries before giving up.
///
/// Transient failures are retried effectively forever; the remote session
/// outlives any individual network outage.
pub const DEFAULT_MAX_ATTEMPTS: u32 = u32::MAX;

/// Timeout for a single transport connect.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Consecutive auth rejections / session replacements tolerated before the
/// supervisor stops hammering the remote service.
pub const AUTH_FAILURE_THRESHOLD: u32 = 3;

// =============================================================================
// Health Constants
// =============================================================================

/// Ceiling of the health score.
pub const MAX_HEALTH_SCORE: u8 = 100;

/// Interval between health monitor ticks.
pub const HEALTH_TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Inactivity window after which a connected session counts as stale.
pub const STALENESS_THRESHOLD: Duration = Duration::from_secs(120);

/// Diagnostics run on every Nth health tick.
pub const DIAGNOSTICS_EVERY_N_TICKS: u64 = 5;

/// Score penalty for a transport close.
pub const CLOSE_PENALTY: u8 = 20;

/// Score penalty for a stale tick while connected.
pub const STALE_PENALTY: u8 = 10;

/// Score penalty when the reachability probe fails.
pub const UNREACHABLE_PENALTY: u8 = 25;

/// Score penalty when credentials are missing or invalid.
pub const MISSING_CREDENTIALS_PENALTY: u8 = 15;

/// Reduced credentials penalty while a first connect is legitimately in
/// flight and no blob exists yet.
pub const MISSING_CREDENTIALS_CONNECTING_PENALTY: u8 = 5;

/// Score below which a connected session is proactively cycled.
pub const FORCE_RECONNECT_THRESHOLD: u8 = 50;

/// Consecutive failures before the notifier is alerted.
pub const ESCALATION_THRESHOLD: u32 = 5;

// =============================================================================
// Store Constants
// =============================================================================

/// File name of the live credential blob.
pub const LIVE_CREDENTIALS_FILE: &str = "credentials.json";

/// Directory under the store root holding backups.
pub const BACKUPS_DIR: &str = "backups";

/// Prefix of a timestamped backup directory.
pub const BACKUP_DIR_PREFIX: &str = "backup_";

/// Sidecar file holding the backup checksum.
pub const CHECKSUM_FILE: &str = "checksum.sha256";

/// Number of backups kept before the oldest is evicted.
pub const BACKUP_RETENTION: usize = 5;

/// Interval between periodic backups while connected.
pub const BACKUP_INTERVAL: Duration = Duration::from_secs(1800);

/// Dotted JSON path that must be present for a credential blob to count
/// as valid.
pub const DEFAULT_IDENTITY_PATH: &str = "me.id";

// =============================================================================
// Diagnostics Constants
// =============================================================================

/// Timeout for a single diagnostics check.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Status Constants
// =============================================================================

/// How many recent error strings the status snapshot retains.
pub const MAX_RECORDED_ERRORS: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_constants_are_ordered() {
        assert!(DEFAULT_BASE_DELAY < DEFAULT_MAX_DELAY);
        assert!(HEALTH_TICK_INTERVAL < STALENESS_THRESHOLD);
        assert!(PROBE_TIMEOUT < DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn penalties_stay_within_score_range() {
        for penalty in [
            CLOSE_PENALTY,
            STALE_PENALTY,
            UNREACHABLE_PENALTY,
            MISSING_CREDENTIALS_PENALTY,
            MISSING_CREDENTIALS_CONNECTING_PENALTY,
        ] {
            assert!(penalty <= MAX_HEALTH_SCORE);
        }
        assert!(FORCE_RECONNECT_THRESHOLD < MAX_HEALTH_SCORE);
    }

    #[test]
    fn retention_keeps_at_least_one_backup() {
        assert!(BACKUP_RETENTION >= 1);
    }
}
