use thiserror::Error;

use crate::exit_codes::ExitCode;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] cachekit_config::ConfigError),

    #[error("path '{path}' does not exist or is not readable: {reason}")]
    PathUnreadable { path: String, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Locked(#[from] cachekit_lock::LockError),

    #[error(transparent)]
    Strategy(#[from] cachekit_pack_strategy::PackStrategyError),

    #[error(transparent)]
    FsInfo(#[from] cachekit_fs_info::FsInfoError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            CliError::Config(_) => ExitCode::CONFIG,
            CliError::InvalidArgument(_) => ExitCode::CONFIG,
            CliError::PathUnreadable { .. } => ExitCode::PATH_UNREADABLE,
            CliError::Locked(_) => ExitCode::LOCKED,
            CliError::Strategy(cachekit_pack_strategy::PackStrategyError::Locked(_)) => ExitCode::LOCKED,
            _ => ExitCode::INTERNAL,
        }
    }
}
