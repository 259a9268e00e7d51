//! Credential persistence with checksummed, retention-limited backups.
//!
//! Layout under the store root:
//!
//! ```text
//! credentials.json          live credential blob
//! backups/
//!   backup_<millis>/
//!     credentials.json      blob copy at backup time
//!     checksum.sha256       hex digest computed at backup time
//! ```
//!
//! All writes go through write-to-temp-then-rename so a crash mid-write
//! never leaves a half-written blob that a later load would misreport as
//! valid. Restores recompute the checksum and refuse to touch the live
//! blob on mismatch; silent corruption is caught here, not at the next
//! failed handshake.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::constants::{
    BACKUPS_DIR, BACKUP_DIR_PREFIX, BACKUP_RETENTION, CHECKSUM_FILE, DEFAULT_IDENTITY_PATH,
    LIVE_CREDENTIALS_FILE,
};
use crate::error::{Error, Result};
use crate::transport::CredentialBlob;

/// The live credential blob plus its validity verdict.
#[derive(Debug, Clone)]
pub struct LoadedCredentials {
    /// The raw blob as read from disk.
    pub blob: CredentialBlob,
    /// Non-empty, parses as JSON, and carries the identity field.
    pub valid: bool,
}

/// A timestamped, checksummed snapshot of the credential blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBackup {
    /// Creation time in milliseconds since the Unix epoch. Doubles as the
    /// backup identifier.
    pub timestamp_ms: u64,
    /// Directory holding the blob copy and its checksum sidecar.
    pub path: PathBuf,
    /// Hex SHA-256 of the blob, computed at backup time.
    pub checksum: String,
}

/// Persists, backs up, and restores the credential blob.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
    retention: usize,
    identity_path: String,
}

impl SessionStore {
    /// Create a store rooted at `root` with default retention and identity
    /// path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            retention: BACKUP_RETENTION,
            identity_path: DEFAULT_IDENTITY_PATH.to_string(),
        }
    }

    /// Set how many backups survive eviction.
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    /// Set the dotted JSON path that must exist for a blob to be valid.
    pub fn with_identity_path(mut self, path: impl Into<String>) -> Self {
        self.identity_path = path.into();
        self
    }

    /// Path of the live credential blob.
    pub fn live_path(&self) -> PathBuf {
        self.root.join(LIVE_CREDENTIALS_FILE)
    }

    fn backups_root(&self) -> PathBuf {
        self.root.join(BACKUPS_DIR)
    }

    /// Load the live credential blob.
    ///
    /// A missing file is a valid "no session yet" result (`Ok(None)`), not
    /// an error. Unreadable storage surfaces as [`Error::CredentialRead`].
    pub fn load_credentials(&self) -> Result<Option<LoadedCredentials>> {
        match fs::read(self.live_path()) {
            Ok(bytes) => {
                let valid = self.is_valid(&bytes);
                Ok(Some(LoadedCredentials {
                    blob: CredentialBlob::new(bytes),
                    valid,
                }))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::CredentialRead {
                message: format!("{}: {e}", self.live_path().display()),
            }),
        }
    }

    /// Overwrite the live credential blob atomically.
    pub fn save(&self, blob: &CredentialBlob) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        atomic_write(&self.live_path(), blob.as_bytes())?;
        debug!(len = blob.len(), "saved live credentials");
        Ok(())
    }

    /// Wipe the live credential blob.
    ///
    /// Used before a forced fresh-session cycle after the remote side logged
    /// this session out. Missing file is fine.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(self.live_path()) {
            Ok(()) => {
                info!("cleared live credentials");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Snapshot the live blob into a new timestamped backup, then evict
    /// backups beyond the retention count, oldest first.
    ///
    /// Returns `Ok(None)` when there is no live blob to back up.
    pub fn backup(&self) -> Result<Option<SessionBackup>> {
        let Some(loaded) = self.load_credentials()? else {
            debug!("no live credentials, skipping backup");
            return Ok(None);
        };

        let mut timestamp_ms = now_millis();
        let mut dir = self
            .backups_root()
            .join(format!("{BACKUP_DIR_PREFIX}{timestamp_ms}"));
        // Two backups in the same millisecond collide on the directory name
        while dir.exists() {
            timestamp_ms += 1;
            dir = self
                .backups_root()
                .join(format!("{BACKUP_DIR_PREFIX}{timestamp_ms}"));
        }
        fs::create_dir_all(&dir)?;

        let checksum = checksum_hex(loaded.blob.as_bytes());
        atomic_write(&dir.join(LIVE_CREDENTIALS_FILE), loaded.blob.as_bytes())?;
        atomic_write(&dir.join(CHECKSUM_FILE), checksum.as_bytes())?;

        info!(timestamp_ms, checksum = %checksum, "created session backup");
        self.evict()?;

        Ok(Some(SessionBackup {
            timestamp_ms,
            path: dir,
            checksum,
        }))
    }

    /// Enumerate surviving backups, newest first.
    ///
    /// Entries with unparseable names or missing checksum sidecars are
    /// skipped with a warning rather than failing the listing.
    pub fn list_backups(&self) -> Result<Vec<SessionBackup>> {
        let root = self.backups_root();
        let entries = match fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(timestamp_ms) = name
                .to_str()
                .and_then(|n| n.strip_prefix(BACKUP_DIR_PREFIX))
                .and_then(|t| t.parse::<u64>().ok())
            else {
                warn!(entry = ?name, "skipping unrecognized entry in backups dir");
                continue;
            };
            let path = entry.path();
            let checksum = match fs::read_to_string(path.join(CHECKSUM_FILE)) {
                Ok(raw) => raw.trim().to_string(),
                Err(e) => {
                    warn!(timestamp_ms, error = %e, "backup missing checksum sidecar");
                    continue;
                }
            };
            backups.push(SessionBackup {
                timestamp_ms,
                path,
                checksum,
            });
        }

        backups.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        Ok(backups)
    }

    /// Restore the most recent backup, or the one matching `target`.
    ///
    /// The blob's checksum is recomputed and compared against the sidecar
    /// written at backup time; any mismatch fails with [`Error::Integrity`]
    /// and leaves the live blob untouched.
    pub fn restore(&self, target: Option<u64>) -> Result<SessionBackup> {
        let backups = self.list_backups()?;
        let backup = match target {
            Some(ts) => backups.into_iter().find(|b| b.timestamp_ms == ts),
            None => backups.into_iter().next(),
        }
        .ok_or(Error::BackupNotFound { target })?;

        let bytes = fs::read(backup.path.join(LIVE_CREDENTIALS_FILE))?;
        let computed = checksum_hex(&bytes);
        if computed != backup.checksum {
            warn!(
                timestamp_ms = backup.timestamp_ms,
                stored = %backup.checksum,
                computed = %computed,
                "backup failed integrity verification"
            );
            return Err(Error::Integrity {
                stored: backup.checksum,
                computed,
            });
        }

        fs::create_dir_all(&self.root)?;
        atomic_write(&self.live_path(), &bytes)?;
        info!(timestamp_ms = backup.timestamp_ms, "restored session backup");
        Ok(backup)
    }

    /// Validity: non-empty, parses as JSON, and the identity path resolves
    /// to a non-null value.
    fn is_valid(&self, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return false;
        }
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(bytes) else {
            return false;
        };
        lookup_path(&value, &self.identity_path)
            .map(|v| !v.is_null())
            .unwrap_or(false)
    }

    fn evict(&self) -> Result<()> {
        let backups = self.list_backups()?;
        for stale in backups.iter().skip(self.retention) {
            debug!(timestamp_ms = stale.timestamp_ms, "evicting old backup");
            fs::remove_dir_all(&stale.path)?;
        }
        Ok(())
    }
}

/// Resolve a dotted path (`me.id`) inside a JSON value.
fn lookup_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Hex SHA-256 digest of `bytes`.
fn checksum_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Write `bytes` to `path` via a temp file in the same directory plus a
/// rename, so readers never observe a partial write.
fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

// =============================================================================
// Tests
// =============================================================================
