//! `FileSystemInfo`: the concurrent, coalescing reader over a filesystem
//! abstraction at the core of the build cache. Computes and caches per-path
//! timestamp and content-hash facts, takes snapshots tied to a start time,
//! and later revalidates those snapshots with well-defined tolerance to
//! clock/timer granularity and in-flight modification.

mod accuracy;
mod deps;
mod error;
mod fact;
mod info;
mod managed;
mod snapshot;

pub use accuracy::AccuracyEstimator;
pub use deps::{resolve_build_dependencies, BuildDependencies};
pub use error::FsInfoError;
pub use fact::{Fact, FsEntry};
pub use info::FileSystemInfo;
pub use managed::managed_item_root;
pub use snapshot::{merge_snapshots, CreateSnapshotOptions, Snapshot};
