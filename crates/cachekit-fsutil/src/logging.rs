//! Structured logging setup, initialized once by whatever binary embeds
//! this workspace. Library crates only ever emit `tracing` events; they
//! never install a subscriber themselves.

use tracing_subscriber::EnvFilter;

/// How log output should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Initialize the global `tracing` subscriber.
///
/// `default_level` seeds the `EnvFilter` when `RUST_LOG` is unset, so a
/// configured `log_level` (e.g. from `cachekit.toml`) still applies without
/// requiring the operator to export an environment variable.
pub fn init_logging(format: LogFormat, default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Pretty => {
            let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt().json().with_env_filter(filter).try_init();
        }
    }
}
