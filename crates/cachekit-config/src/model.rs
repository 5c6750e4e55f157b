//! `CacheOptions`: the resolved configuration surface, plus the raw,
//! partially-populated shape TOML files deserialize into.

use camino::Utf8PathBuf;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Pretty
    }
}

/// Fully resolved configuration, after applying CLI > TOML > default
/// precedence.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub cache_location: Utf8PathBuf,
    pub version: String,
    pub managed_paths: Vec<Utf8PathBuf>,
    pub max_age_ms: i64,
    pub hash_mode: bool,
    pub log_format: LogFormat,
    pub log_level: String,
}

impl CacheOptions {
    pub const DEFAULT_VERSION: &'static str = "1";
    pub const DEFAULT_MAX_AGE: &'static str = "2d";
    pub const DEFAULT_LOG_LEVEL: &'static str = "info";
}

/// The shape a `cachekit.toml` file deserializes into. Every field is
/// optional so a file may set only what it cares about; unknown keys are a
/// hard error, validated once at startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTomlConfig {
    pub cache_location: Option<Utf8PathBuf>,
    pub version: Option<String>,
    #[serde(default)]
    pub managed_paths: Vec<Utf8PathBuf>,
    pub max_age: Option<String>,
    pub hash_mode: Option<bool>,
    pub log_format: Option<LogFormat>,
    pub log_level: Option<String>,
}

/// CLI-flag overrides, which take precedence over any TOML value for the
/// same run. Every field is optional; an unset field falls through to the
/// TOML value, then the documented default.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub cache_location: Option<Utf8PathBuf>,
    pub version: Option<String>,
    pub managed_paths: Vec<Utf8PathBuf>,
    pub max_age: Option<String>,
    pub hash_mode: Option<bool>,
    pub log_format: Option<LogFormat>,
    pub log_level: Option<String>,
}
