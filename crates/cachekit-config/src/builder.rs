//! Resolve a [`CacheOptions`] from a discovered TOML file plus CLI
//! overrides, applying CLI > TOML > default precedence.

use camino::Utf8Path;

use crate::discovery::discover_config_file;
use crate::duration::parse_duration_ms;
use crate::error::ConfigError;
use crate::model::{CacheOptions, CliOverrides, LogFormat, RawTomlConfig};

/// Read and parse `cachekit.toml` if `start_dir` or one of its ancestors
/// has one. Unknown keys are a hard error (`deny_unknown_fields`).
pub fn load_toml_config(start_dir: &Utf8Path) -> Result<RawTomlConfig, ConfigError> {
    match discover_config_file(start_dir) {
        None => Ok(RawTomlConfig::default()),
        Some(path) => {
            let contents = std::fs::read_to_string(path.as_std_path())
                .map_err(|e| ConfigError::Io { path: path.to_string(), reason: e.to_string() })?;
            toml::from_str(&contents).map_err(|e| ConfigError::Parse { path: path.to_string(), reason: e.to_string() })
        }
    }
}

/// Merge a raw TOML config and CLI overrides into a fully resolved
/// [`CacheOptions`], filling in documented defaults for anything neither
/// source set.
pub fn resolve(toml_config: RawTomlConfig, overrides: CliOverrides) -> Result<CacheOptions, ConfigError> {
    let cache_location = overrides
        .cache_location
        .or(toml_config.cache_location)
        .ok_or(ConfigError::MissingCacheLocation)?;

    let version = overrides
        .version
        .or(toml_config.version)
        .unwrap_or_else(|| CacheOptions::DEFAULT_VERSION.to_string());

    let managed_paths = if !overrides.managed_paths.is_empty() {
        overrides.managed_paths
    } else {
        toml_config.managed_paths
    };

    let max_age_str =
        overrides.max_age.or(toml_config.max_age).unwrap_or_else(|| CacheOptions::DEFAULT_MAX_AGE.to_string());
    let max_age_ms = parse_duration_ms(&max_age_str)?;

    let hash_mode = overrides.hash_mode.or(toml_config.hash_mode).unwrap_or(false);

    let log_format = overrides.log_format.or(toml_config.log_format).unwrap_or(LogFormat::Pretty);

    let log_level =
        overrides.log_level.or(toml_config.log_level).unwrap_or_else(|| CacheOptions::DEFAULT_LOG_LEVEL.to_string());

    Ok(CacheOptions { cache_location, version, managed_paths, max_age_ms, hash_mode, log_format, log_level })
}
