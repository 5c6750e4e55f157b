//! `PackFileCacheStrategy`: orchestrates pack restore (with build-snapshot
//! revalidation), store, and atomic rewrite.

use std::sync::Arc;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::Mutex;

use cachekit_fs_info::{resolve_build_dependencies, CreateSnapshotOptions, FileSystemInfo};
use cachekit_pack::Pack;

use crate::error::PackStrategyError;

/// Default GC threshold applied in [`PackFileCacheStrategy::after_all_stored`]:
/// entries older than two days are collected.
pub const DEFAULT_MAX_AGE_MS: i64 = 2 * 24 * 60 * 60 * 1000;

fn pack_path(cache_location: &Utf8Path) -> Utf8PathBuf {
    format!("{cache_location}.pack").into()
}

pub struct PackFileCacheStrategy {
    cache_location: Utf8PathBuf,
    fs_info: Arc<FileSystemInfo>,
    pack: Mutex<Pack>,
}

impl PackFileCacheStrategy {
    /// Load (or freshly create) the pack at `cache_location`, revalidating
    /// any embedded build snapshot against the current filesystem before
    /// deciding whether it is trustworthy.
    pub async fn new(
        cache_location: Utf8PathBuf,
        version: impl Into<String>,
        fs_info: Arc<FileSystemInfo>,
    ) -> Self {
        let version = version.into();
        let path = pack_path(&cache_location);
        let pack = Self::load_or_fresh(&path, &version, &fs_info).await;
        Self { cache_location, fs_info, pack: Mutex::new(pack) }
    }

    async fn load_or_fresh(path: &Utf8Path, version: &str, fs_info: &Arc<FileSystemInfo>) -> Pack {
        let loaded = match Pack::deserialize_from_file(path) {
            Ok(pack) => pack,
            Err(e) => {
                if path.exists() {
                    tracing::warn!(error = %e, path = %path, "failed to load pack file, starting fresh");
                } else {
                    tracing::debug!(path = %path, "no existing pack file, starting fresh");
                }
                return Pack::new(version);
            }
        };

        if loaded.version() != version {
            tracing::warn!(
                found = loaded.version(),
                expected = version,
                "pack version mismatch, starting fresh"
            );
            return Pack::new(version);
        }

        match loaded.build_snapshot() {
            None => loaded,
            Some(snapshot) => match Arc::clone(fs_info).check_snapshot_valid(snapshot).await {
                Ok(true) => loaded,
                Ok(false) => {
                    tracing::warn!(path = %path, "pack's build snapshot is no longer valid, starting fresh");
                    Pack::new(version)
                }
                Err(e) => {
                    tracing::warn!(error = %e, path = %path, "failed to revalidate pack snapshot, starting fresh");
                    Pack::new(version)
                }
            },
        }
    }

    pub fn cache_location(&self) -> &Utf8Path {
        &self.cache_location
    }

    pub async fn store(&self, id: &str, etag: &str, data: Vec<u8>) {
        self.pack.lock().await.set(id, etag, data);
    }

    pub async fn restore(&self, id: &str, etag: &str) -> Option<Vec<u8>> {
        self.pack.lock().await.get(id, etag)
    }

    pub async fn stats(&self) -> cachekit_pack::PackStats {
        self.pack.lock().await.stats()
    }

    /// Resolve `deps` against `context` and fold the resulting hash-mode
    /// snapshot into the pack's embedded build snapshot.
    pub async fn store_build_dependencies(
        &self,
        context: &Utf8Path,
        deps: &[String],
    ) -> Result<(), PackStrategyError> {
        let build_deps = resolve_build_dependencies(Arc::clone(&self.fs_info), context, deps).await?;
        let snapshot = Arc::clone(&self.fs_info)
            .create_snapshot(
                None,
                &build_deps.files,
                &build_deps.directories,
                &build_deps.missing,
                CreateSnapshotOptions { hash: true },
            )
            .await;

        self.pack.lock().await.set_build_snapshot(snapshot);
        Ok(())
    }

    /// No-op unless the in-memory pack differs from disk; otherwise garbage
    /// collects stale entries and rewrites the pack file atomically under
    /// the single-writer lock.
    pub async fn after_all_stored(&self) -> Result<(), PackStrategyError> {
        let mut pack = self.pack.lock().await;
        if !pack.is_invalid() {
            return Ok(());
        }
        self.collect_and_rewrite(&mut pack, DEFAULT_MAX_AGE_MS).await
    }

    /// Force a garbage collection pass at `max_age_ms` and rewrite the pack
    /// file, regardless of whether it is currently marked invalid. Used by
    /// the `gc` CLI command to let an operator reclaim space on demand.
    pub async fn gc(&self, max_age_ms: i64) -> Result<(), PackStrategyError> {
        let mut pack = self.pack.lock().await;
        self.collect_and_rewrite(&mut pack, max_age_ms).await
    }

    async fn collect_and_rewrite(&self, pack: &mut Pack, max_age_ms: i64) -> Result<(), PackStrategyError> {
        pack.collect_garbage(max_age_ms);

        let path = pack_path(&self.cache_location);
        let _guard = cachekit_lock::acquire(&self.cache_location)?;

        let start = Instant::now();
        let bytes = pack.serialize()?;
        cachekit_fsutil::write_file_atomic(&path, &bytes)?;
        tracing::info!(path = %path, bytes = bytes.len(), elapsed_ms = start.elapsed().as_millis(), "pack file rewritten");

        Ok(())
    }
}
