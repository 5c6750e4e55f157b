use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackStrategyError {
    #[error(transparent)]
    Pack(#[from] cachekit_pack::PackError),

    #[error(transparent)]
    FsInfo(#[from] cachekit_fs_info::FsInfoError),

    #[error("pack file is locked by another process: {0}")]
    Locked(#[from] cachekit_lock::LockError),

    #[error("failed to write pack file: {0}")]
    Write(#[from] anyhow::Error),
}
