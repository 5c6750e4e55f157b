use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("failed to encode pack file: {0}")]
    Codec(#[from] cachekit_serde::CodecError),

    #[error("failed to mmap pack file {path}: {reason}")]
    Mmap { path: String, reason: String },

    #[error("I/O error on pack file {path}: {reason}")]
    Io { path: String, reason: String },
}
