//! Small filesystem and logging utilities shared across the cachekit
//! workspace. Adapted from the reference workspace's `atomic_write` and
//! `logging` modules, trimmed to what the pack strategy and CLI need.

pub mod atomic_write;
pub mod logging;

pub use atomic_write::{write_file_atomic, AtomicWriteResult};
pub use logging::{init_logging, LogFormat};
