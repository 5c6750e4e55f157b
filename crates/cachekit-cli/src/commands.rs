use std::sync::Arc;

use camino::Utf8PathBuf;

use cachekit_config::{CacheOptions, CliOverrides, LogFormat as ConfigLogFormat};
use cachekit_fs_info::{CreateSnapshotOptions, Fact, FileSystemInfo};
use cachekit_fsutil::LogFormat as FsutilLogFormat;
use cachekit_pack_strategy::PackFileCacheStrategy;
use cachekit_resolver::{NoModuleChildren, SimpleResolver};
use cachekit_vfs::RealFileSystem;

use crate::args::{Cli, Command};
use crate::error::CliError;

fn overrides_from(cli: &Cli) -> Result<CliOverrides, CliError> {
    let log_format = match cli.log_format.as_deref() {
        None => None,
        Some("pretty") => Some(ConfigLogFormat::Pretty),
        Some("json") => Some(ConfigLogFormat::Json),
        Some(other) => {
            return Err(CliError::InvalidArgument(format!("log-format must be 'pretty' or 'json', got '{other}'")))
        }
    };

    Ok(CliOverrides {
        cache_location: cli.cache_location.clone(),
        version: cli.version.clone(),
        managed_paths: Vec::new(),
        max_age: cli.max_age.clone(),
        hash_mode: None,
        log_format,
        log_level: cli.log_level.clone(),
    })
}

fn to_fsutil_log_format(format: ConfigLogFormat) -> FsutilLogFormat {
    match format {
        ConfigLogFormat::Pretty => FsutilLogFormat::Pretty,
        ConfigLogFormat::Json => FsutilLogFormat::Json,
    }
}

fn fs_info(options: &CacheOptions) -> Arc<FileSystemInfo> {
    FileSystemInfo::new(
        Arc::new(RealFileSystem),
        Arc::new(SimpleResolver::new(RealFileSystem)),
        Arc::new(NoModuleChildren),
        options.managed_paths.clone(),
    )
}

async fn strategy_for(options: &CacheOptions) -> PackFileCacheStrategy {
    PackFileCacheStrategy::new(options.cache_location.clone(), options.version.clone(), fs_info(options)).await
}

/// Resolve configuration, initialize logging, and dispatch to the requested
/// subcommand. Returns the bytes (if any) the caller should write to
/// stdout, so `run` stays free of I/O beyond that single write.
pub async fn dispatch(cli: Cli) -> Result<Option<Vec<u8>>, CliError> {
    let start_dir = std::env::current_dir()
        .ok()
        .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("."));

    let overrides = overrides_from(&cli)?;
    let toml_config = match &cli.config {
        Some(path) => {
            let contents = std::fs::read_to_string(path.as_std_path())
                .map_err(|e| cachekit_config::ConfigError::Io { path: path.to_string(), reason: e.to_string() })?;
            toml::from_str(&contents)
                .map_err(|e| cachekit_config::ConfigError::Parse { path: path.to_string(), reason: e.to_string() })?
        }
        None => cachekit_config::load_toml_config(&start_dir)?,
    };
    let options = cachekit_config::resolve(toml_config, overrides)?;

    cachekit_fsutil::init_logging(to_fsutil_log_format(options.log_format), &options.log_level);
    tracing::debug!(cache_location = %options.cache_location, version = %options.version, "resolved cachekit configuration");

    match cli.command {
        Command::Check { path, hash } => check(&options, &path, hash).await.map(|_| None),
        Command::Store { id, etag, file } => {
            tracing::info!(id = %id, file = %file, "storing pack entry");
            store(&options, &id, &etag, &file).await.map(|_| None)
        }
        Command::Restore { id, etag } => restore(&options, &id, &etag).await,
        Command::Gc { max_age } => gc(&options, max_age.as_deref()).await.map(|_| None),
        Command::Inspect => inspect(&options).await.map(Some),
    }
}

/// Build a snapshot over a single path and immediately validate it, the way
/// a build tool would check a cached input before trusting a cache hit.
async fn check(options: &CacheOptions, path: &Utf8PathBuf, hash: bool) -> Result<(), CliError> {
    let info = fs_info(options);
    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    let snapshot = Arc::clone(&info)
        .create_snapshot(Some(now_ms), std::slice::from_ref(path), &[], &[], CreateSnapshotOptions { hash })
        .await;

    let present = if hash {
        !matches!(snapshot.file_hashes.get(path), Some(Fact::Missing) | Some(Fact::Error) | None)
    } else {
        !matches!(snapshot.file_timestamps.get(path), Some(Fact::Missing) | Some(Fact::Error) | None)
    };
    if !present {
        return Err(CliError::PathUnreadable {
            path: path.to_string(),
            reason: "path is missing or could not be read".to_string(),
        });
    }

    let valid = info.check_snapshot_valid(&snapshot).await?;
    if valid {
        println!("valid: {path}");
        Ok(())
    } else {
        Err(CliError::PathUnreadable {
            path: path.to_string(),
            reason: "snapshot validation failed immediately after snapshotting".to_string(),
        })
    }
}

async fn store(options: &CacheOptions, id: &str, etag: &str, file: &Utf8PathBuf) -> Result<(), CliError> {
    let data = std::fs::read(file.as_std_path())
        .map_err(|e| CliError::PathUnreadable { path: file.to_string(), reason: e.to_string() })?;

    let strategy = strategy_for(options).await;
    strategy.store(id, etag, data).await;
    strategy.after_all_stored().await?;
    Ok(())
}

async fn restore(options: &CacheOptions, id: &str, etag: &str) -> Result<Option<Vec<u8>>, CliError> {
    let strategy = strategy_for(options).await;
    Ok(strategy.restore(id, etag).await)
}

async fn gc(options: &CacheOptions, max_age_override: Option<&str>) -> Result<(), CliError> {
    let max_age_ms = match max_age_override {
        Some(value) => cachekit_config::parse_duration_ms(value)?,
        None => options.max_age_ms,
    };
    let strategy = strategy_for(options).await;
    strategy.gc(max_age_ms).await?;
    Ok(())
}

async fn inspect(options: &CacheOptions) -> Result<Vec<u8>, CliError> {
    let strategy = strategy_for(options).await;
    let stats = strategy.stats().await;
    Ok(serde_json::to_vec_pretty(&stats)?)
}
