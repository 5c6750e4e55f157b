use cachekit_resolver::ResolveError;
use cachekit_vfs::FsError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum FsInfoError {
    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("failed to parse manifest at {path}: {reason}")]
    ManifestParse { path: String, reason: String },

    #[error("background task failed: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for FsInfoError {
    fn from(err: tokio::task::JoinError) -> Self {
        FsInfoError::Join(err.to_string())
    }
}
