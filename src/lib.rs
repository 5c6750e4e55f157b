//! Incremental build cache core.
//!
//! This crate is a thin re-export over the workspace's member crates: a
//! concurrent, coalescing filesystem fact cache ([`FileSystemInfo`]) and a
//! keyed artifact pack with atomic persistence ([`PackFileCacheStrategy`]).
//! See each member crate for the implementation; this surface exists so a
//! consumer can depend on a single `cachekit` crate.

pub use cachekit_config::{
    discover_config_file, load as load_config, resolve as resolve_config, CacheOptions, CliOverrides, ConfigError,
    LogFormat,
};
pub use cachekit_fs_info::{
    merge_snapshots, resolve_build_dependencies, managed_item_root, AccuracyEstimator, BuildDependencies, Fact,
    FileSystemInfo, FsEntry, FsInfoError, Snapshot,
};
pub use cachekit_pack::{ContentRef, Pack, PackError, PackStats, MAX_INLINE_SIZE};
pub use cachekit_pack_strategy::{PackFileCacheStrategy, PackStrategyError, DEFAULT_MAX_AGE_MS};
