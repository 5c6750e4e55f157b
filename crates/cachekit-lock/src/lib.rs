//! Single-writer advisory lock guarding a pack file's atomic rewrite.
//!
//! Adapted from the reference workspace's per-directory lock, trimmed down
//! to "one lock per pack file". The lock is advisory: it coordinates
//! `cachekit` processes pointed at the same `cache_location`, it is not a
//! security boundary, and it is only taken around the rewrite in
//! `PackFileCacheStrategy::after_all_stored` — restores and in-memory reads
//! never block on it.
//!
//! Exclusion comes from atomically creating `${cache_location}.pack.lock`
//! with `O_EXCL` (`create_new`), the same mechanism the reference lock uses:
//! a second process racing to create the same path gets `AlreadyExists`
//! rather than a TOCTOU window. An `fd_lock::RwLock` is layered on top while
//! writing the diagnostic payload as a courtesy against other tools poking
//! at the same file; it is not what makes the lock exclusive. The guard
//! removes the lock file on drop so a later `acquire` in the same process
//! (a second `store`/`gc` cycle) isn't blocked by its own leftover lock.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Age past which a lock file is treated as abandoned rather than live,
/// even if its recorded process happens to still exist (clock skew, PID
/// reuse, etc).
const DEFAULT_STALE_THRESHOLD_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("pack file '{0}' is locked by another process")]
    AlreadyLocked(String),

    #[error("failed to read or write lock file '{path}': {reason}")]
    Io { path: String, reason: String },
}

/// Diagnostic payload written into `${cache_location}.pack.lock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheLockInfo {
    pub pid: u32,
    pub created_at_unix_secs: u64,
    pub cache_location: String,
}

impl CacheLockInfo {
    fn now(cache_location: &Utf8Path) -> Self {
        let created_at_unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            pid: process::id(),
            created_at_unix_secs,
            cache_location: cache_location.to_string(),
        }
    }

    fn age_secs(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        now.saturating_sub(self.created_at_unix_secs)
    }

    /// Best-effort liveness probe. Only implemented for Linux's `/proc`;
    /// elsewhere we fall back to age-based staleness alone.
    fn process_is_alive(&self) -> bool {
        #[cfg(target_os = "linux")]
        {
            std::path::Path::new(&format!("/proc/{}", self.pid)).exists()
        }
        #[cfg(not(target_os = "linux"))]
        {
            true
        }
    }

    fn is_stale(&self, threshold_secs: u64) -> bool {
        self.age_secs() > threshold_secs || !self.process_is_alive()
    }
}

/// An acquired lock on a pack file's rewrite path. Dropping the guard
/// releases the advisory lock and removes `${cache_location}.pack.lock`.
pub struct CacheLockGuard {
    lock_path: Utf8PathBuf,
    // Held for the guard's lifetime purely as a courtesy OS-level lock; the
    // actual exclusion is the atomic `create_new` that produced `lock_path`.
    _fd_lock: Option<Box<RwLock<File>>>,
}

/// Acquire the single-writer lock for `cache_location`, reclaiming a stale
/// lock left behind by a dead or long-gone process instead of treating it
/// as a permanent block.
pub fn acquire(cache_location: &Utf8Path) -> Result<CacheLockGuard, LockError> {
    acquire_with_threshold(cache_location, DEFAULT_STALE_THRESHOLD_SECS)
}

pub fn acquire_with_threshold(
    cache_location: &Utf8Path,
    stale_threshold_secs: u64,
) -> Result<CacheLockGuard, LockError> {
    let lock_path: Utf8PathBuf = format!("{cache_location}.pack.lock").into();

    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LockError::Io {
            path: lock_path.to_string(),
            reason: e.to_string(),
        })?;
    }

    match create_lock_file(&lock_path) {
        Ok(file) => finalize_lock(lock_path, file, cache_location),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            match read_lock_info(&lock_path)? {
                Some(existing) if !existing.is_stale(stale_threshold_secs) => {
                    Err(LockError::AlreadyLocked(cache_location.to_string()))
                }
                existing => {
                    if let Some(existing) = existing {
                        tracing::warn!(
                            pid = existing.pid,
                            age_secs = existing.age_secs(),
                            "reclaiming stale cache lock"
                        );
                    }
                    // Best-effort reclaim: another process may win the race to
                    // recreate the file, in which case this acquire fails.
                    let _ = std::fs::remove_file(lock_path.as_std_path());
                    let file = create_lock_file(&lock_path).map_err(|_| {
                        LockError::AlreadyLocked(cache_location.to_string())
                    })?;
                    finalize_lock(lock_path, file, cache_location)
                }
            }
        }
        Err(e) => Err(LockError::Io { path: lock_path.to_string(), reason: e.to_string() }),
    }
}

/// Atomically create (and exclusively own) the lock file. `O_EXCL` via
/// `create_new` is what actually prevents two processes from both believing
/// they hold the lock, not the `fd_lock` layered on top afterward.
fn create_lock_file(lock_path: &Utf8Path) -> std::io::Result<File> {
    OpenOptions::new().create_new(true).read(true).write(true).open(lock_path.as_std_path())
}

fn finalize_lock(
    lock_path: Utf8PathBuf,
    file: File,
    cache_location: &Utf8Path,
) -> Result<CacheLockGuard, LockError> {
    let info = CacheLockInfo::now(cache_location);
    let payload = serde_json::to_vec(&info).map_err(|e| LockError::Io {
        path: lock_path.to_string(),
        reason: e.to_string(),
    })?;

    let mut rw_lock = Box::new(RwLock::new(file));
    {
        let mut write_guard = rw_lock
            .try_write()
            .map_err(|_| LockError::AlreadyLocked(cache_location.to_string()))?;
        write_guard.write_all(&payload).map_err(|e| LockError::Io {
            path: lock_path.to_string(),
            reason: e.to_string(),
        })?;
        write_guard.flush().map_err(|e| LockError::Io {
            path: lock_path.to_string(),
            reason: e.to_string(),
        })?;
    }

    Ok(CacheLockGuard { lock_path, _fd_lock: Some(rw_lock) })
}

fn read_lock_info(lock_path: &Utf8Path) -> Result<Option<CacheLockInfo>, LockError> {
    if !lock_path.exists() {
        return Ok(None);
    }
    let mut contents = String::new();
    File::open(lock_path.as_std_path())
        .and_then(|mut f| f.read_to_string(&mut contents))
        .map_err(|e| LockError::Io { path: lock_path.to_string(), reason: e.to_string() })?;
    if contents.trim().is_empty() {
        return Ok(None);
    }
    Ok(serde_json::from_str(&contents).ok())
}

impl Drop for CacheLockGuard {
    fn drop(&mut self) {
        self._fd_lock.take();
        let _ = std::fs::remove_file(self.lock_path.as_std_path());
    }
}
