//! The `InputFileSystem` external collaborator contract: the minimal set of
//! filesystem operations the cache core needs, plus a `tokio::fs`-backed
//! default implementation.

use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Errors surfaced by an [`InputFileSystem`] implementation.
#[derive(Debug, Error, Clone)]
pub enum FsError {
    #[error("path not found: {path}")]
    NotFound { path: String },

    #[error("I/O error reading {path}: {reason}")]
    Io { path: String, reason: String },
}

impl FsError {
    /// Whether this error represents a missing path (ENOENT), which the
    /// cache core treats as a valid negative fact rather than a failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }

    fn from_io(path: &Utf8Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            FsError::NotFound { path: path.to_string() }
        } else {
            FsError::Io { path: path.to_string(), reason: err.to_string() }
        }
    }
}

/// The timestamp/kind facts the cache core needs about one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsMetadata {
    /// Milliseconds since the Unix epoch, or `None` if the mtime is
    /// unavailable on this platform/filesystem (treated as "0/unknown" for
    /// safe-time purposes).
    pub mtime_ms: Option<i64>,
    pub is_file: bool,
    pub is_dir: bool,
}

/// The filesystem operations the build cache core consumes. Kept small and
/// `async_trait`-object-safe so a caller can substitute an in-memory or
/// recorded-fixture filesystem in tests.
#[async_trait]
pub trait InputFileSystem: Send + Sync {
    async fn stat(&self, path: &Utf8Path) -> Result<FsMetadata, FsError>;
    async fn read_file(&self, path: &Utf8Path) -> Result<Vec<u8>, FsError>;
    async fn read_dir(&self, path: &Utf8Path) -> Result<Vec<String>, FsError>;
    async fn realpath(&self, path: &Utf8Path) -> Result<Utf8PathBuf, FsError>;
}

/// The default `InputFileSystem`, backed by `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

#[async_trait]
impl InputFileSystem for RealFileSystem {
    async fn stat(&self, path: &Utf8Path) -> Result<FsMetadata, FsError> {
        let metadata = tokio::fs::metadata(path.as_std_path())
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        let mtime_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64);
        Ok(FsMetadata {
            mtime_ms,
            is_file: metadata.is_file(),
            is_dir: metadata.is_dir(),
        })
    }

    async fn read_file(&self, path: &Utf8Path) -> Result<Vec<u8>, FsError> {
        tokio::fs::read(path.as_std_path())
            .await
            .map_err(|e| FsError::from_io(path, e))
    }

    async fn read_dir(&self, path: &Utf8Path) -> Result<Vec<String>, FsError> {
        let mut entries = tokio::fs::read_dir(path.as_std_path())
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        let mut names = Vec::new();
        loop {
            let next = entries
                .next_entry()
                .await
                .map_err(|e| FsError::from_io(path, e))?;
            match next {
                Some(entry) => {
                    if let Some(name) = entry.file_name().to_str() {
                        names.push(name.to_string());
                    }
                }
                None => break,
            }
        }
        Ok(names)
    }

    async fn realpath(&self, path: &Utf8Path) -> Result<Utf8PathBuf, FsError> {
        let canonical = tokio::fs::canonicalize(path.as_std_path())
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        Utf8PathBuf::from_path_buf(canonical).map_err(|p| FsError::Io {
            path: path.to_string(),
            reason: format!("canonicalized path is not valid UTF-8: {}", p.display()),
        })
    }
}
