use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("cache_location is required (set it in cachekit.toml or pass --cache-location)")]
    MissingCacheLocation,

    #[error("invalid max_age value '{value}': {reason}")]
    InvalidMaxAge { value: String, reason: String },
}
