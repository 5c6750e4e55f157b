mod builder;
mod discovery;
mod duration;
mod error;
mod model;

pub use builder::{load_toml_config, resolve};
pub use discovery::{discover_config_file, CONFIG_FILE_NAME};
pub use duration::parse_duration_ms;
pub use error::ConfigError;
pub use model::{CacheOptions, CliOverrides, LogFormat, RawTomlConfig};

use camino::Utf8Path;

/// Discover, parse, and resolve the cache configuration for a run rooted at
/// `start_dir`, applying CLI > TOML > default precedence.
pub fn load(start_dir: &Utf8Path, overrides: CliOverrides) -> Result<CacheOptions, ConfigError> {
    let toml_config = load_toml_config(start_dir)?;
    resolve(toml_config, overrides)
}
