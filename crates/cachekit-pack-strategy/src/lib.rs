//! `PackFileCacheStrategy`: the orchestration layer over [`cachekit_pack::Pack`]
//! that loads-with-revalidation, stores, and atomically rewrites the pack
//! file on disk.

mod error;
mod strategy;

pub use error::PackStrategyError;
pub use strategy::{PackFileCacheStrategy, DEFAULT_MAX_AGE_MS};
