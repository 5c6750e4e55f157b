use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// cachekit - incremental build cache core
#[derive(Parser)]
#[command(name = "cachekit")]
#[command(about = "Filesystem snapshot validation and a persistable artifact pack")]
#[command(version)]
pub struct Cli {
    /// Path to cachekit.toml (overrides upward discovery)
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Cache location, overriding config file and defaults
    #[arg(long, global = true)]
    pub cache_location: Option<Utf8PathBuf>,

    /// Pack format version tag, overriding config file and defaults
    #[arg(long, global = true)]
    pub version: Option<String>,

    /// Entry max age before garbage collection, e.g. "2d", "90s"
    #[arg(long, global = true)]
    pub max_age: Option<String>,

    /// Log output format: pretty or json
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log level, e.g. info, debug, trace
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a path's cached filesystem fact against its current state
    Check {
        path: Utf8PathBuf,
        /// Compare content hash instead of modification timestamp
        #[arg(long)]
        hash: bool,
    },

    /// Store a file's bytes in the pack under the given identifier and etag
    Store { id: String, etag: String, file: Utf8PathBuf },

    /// Restore previously stored bytes, if the etag still matches
    Restore { id: String, etag: String },

    /// Force a garbage-collection pass and rewrite the pack file
    Gc {
        /// Override the configured max age for this run only
        #[arg(long)]
        max_age: Option<String>,
    },

    /// Print pack diagnostics as JSON
    Inspect,
}
