//! `Pack`: a keyed in-memory artifact store with per-entry staleness and a
//! two-tier (inline vs. lazy) on-disk representation.

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use std::io::Write as _;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use cachekit_fs_info::Snapshot;
use cachekit_serde::{open_mmap, read_pack_file, write_pack_file, LazyBlob, MeasuringWriter};

use crate::content::ContentRef;
use crate::error::PackError;

/// Entries above this serialized size are stored as lazy (offset-addressed)
/// blobs instead of being held inline in memory at load time.
pub const MAX_INLINE_SIZE: usize = 20_000;

/// Everything persisted to disk except the raw entry bytes themselves,
/// which live in the data section addressed by [`IndexEntry`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct PackMetadata {
    version: String,
    etags: HashMap<String, String>,
    unserializable: HashSet<String>,
    last_access: HashMap<String, i64>,
    build_snapshot: Option<Snapshot>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum IndexEntry {
    Inline { offset: u64, len: u64 },
    Lazy { offset: u64, len: u64 },
}

/// Diagnostic counters for a pack, as surfaced by the `inspect` CLI command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackStats {
    pub version: String,
    pub entry_count: usize,
    pub inline_count: usize,
    pub lazy_count: usize,
    pub unserializable_count: usize,
    pub total_inline_bytes: usize,
    pub build_snapshot_path_count: usize,
    pub is_invalid: bool,
}

/// A keyed artifact store: `identifier -> (etag, data, lastAccess, lastSize)`
/// plus an embedded build-dependency [`Snapshot`] that gates whether the
/// whole pack is still trustworthy.
pub struct Pack {
    version: String,
    etags: HashMap<String, String>,
    content: HashMap<String, ContentRef>,
    last_access: HashMap<String, i64>,
    last_sizes: HashMap<String, usize>,
    unserializable: HashSet<String>,
    used: HashSet<String>,
    invalid: bool,
    build_snapshot: Option<Snapshot>,
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

impl Pack {
    /// Create a fresh, empty pack stamped with `version`. Mismatched
    /// versions on restore never migrate into this constructor's state —
    /// callers discard the old pack and start here instead: a pack never
    /// migrates across versions.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            etags: HashMap::new(),
            content: HashMap::new(),
            last_access: HashMap::new(),
            last_sizes: HashMap::new(),
            unserializable: HashSet::new(),
            used: HashSet::new(),
            invalid: false,
            build_snapshot: None,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    pub fn build_snapshot(&self) -> Option<&Snapshot> {
        self.build_snapshot.as_ref()
    }

    pub fn set_build_snapshot(&mut self, snapshot: Snapshot) {
        self.build_snapshot = match self.build_snapshot.take() {
            Some(existing) => Some(cachekit_fs_info::merge_snapshots(&existing, &snapshot)),
            None => Some(snapshot),
        };
        self.invalid = true;
    }

    pub fn entry_count(&self) -> usize {
        self.content.len()
    }

    pub fn inline_count(&self) -> usize {
        self.content.values().filter(|c| !c.is_lazy()).count()
    }

    pub fn lazy_count(&self) -> usize {
        self.content.values().filter(|c| c.is_lazy()).count()
    }

    pub fn unserializable_count(&self) -> usize {
        self.unserializable.len()
    }

    pub fn total_inline_bytes(&self) -> usize {
        self.content.values().filter(|c| !c.is_lazy()).map(ContentRef::len).sum()
    }

    /// A snapshot of pack-level counters, primarily for the `inspect` CLI
    /// command.
    pub fn stats(&self) -> PackStats {
        PackStats {
            version: self.version.clone(),
            entry_count: self.entry_count(),
            inline_count: self.inline_count(),
            lazy_count: self.lazy_count(),
            unserializable_count: self.unserializable_count(),
            total_inline_bytes: self.total_inline_bytes(),
            build_snapshot_path_count: self.build_snapshot.as_ref().map(Snapshot::path_count).unwrap_or(0),
            is_invalid: self.invalid,
        }
    }

    /// Return `id`'s data if present and `etag` matches, applying the
    /// migration policy on read.
    pub fn get(&mut self, id: &str, etag: &str) -> Option<Vec<u8>> {
        if self.etags.get(id).map(String::as_str) != Some(etag) {
            return None;
        }
        self.used.insert(id.to_string());

        let (data, currently_inline) = match self.content.get(id)? {
            ContentRef::Inline(bytes) => (bytes.clone(), true),
            ContentRef::Lazy(blob) => (blob.bytes().to_vec(), false),
        };
        self.unpack(id, Some(data), currently_inline)
    }

    /// Insert or replace `id`'s data. A no-op if `id` was previously marked
    /// unserializable.
    pub fn set(&mut self, id: &str, etag: &str, data: Vec<u8>) {
        if self.unserializable.contains(id) {
            return;
        }
        self.last_sizes.insert(id.to_string(), data.len());
        self.etags.insert(id.to_string(), etag.to_string());
        self.content.insert(id.to_string(), ContentRef::Inline(data));
        self.used.insert(id.to_string());
        self.invalid = true;
    }

    /// Drain `used` into `last_access` at the current clock, then drop any
    /// entry whose last access exceeds `max_age_ms`.
    pub fn collect_garbage(&mut self, max_age_ms: i64) {
        self.collect_garbage_at(max_age_ms, now_ms());
    }

    pub fn collect_garbage_at(&mut self, max_age_ms: i64, now: i64) {
        for id in self.used.drain() {
            self.last_access.insert(id, now);
        }
        let stale: Vec<String> = self
            .last_access
            .iter()
            .filter(|(_, &last)| now.saturating_sub(last) > max_age_ms)
            .map(|(id, _)| id.clone())
            .collect();
        if !stale.is_empty() {
            self.invalid = true;
        }
        for id in stale {
            self.last_access.remove(&id);
            self.etags.remove(&id);
            self.content.remove(&id);
            self.last_sizes.remove(&id);
            tracing::debug!(id = %id, "pack entry garbage collected");
        }
    }

    /// Apply the inline/lazy migration policy to a just-read entry and
    /// return its data, or `None` (marking `id` unserializable) if it
    /// carried no data.
    fn unpack(&mut self, id: &str, data: Option<Vec<u8>>, currently_inline: bool) -> Option<Vec<u8>> {
        let data = match data {
            Some(d) => d,
            None => {
                self.unserializable.insert(id.to_string());
                self.last_sizes.remove(id);
                return None;
            }
        };
        let size = data.len();
        self.last_sizes.insert(id.to_string(), size);

        if currently_inline && size > MAX_INLINE_SIZE {
            self.invalid = true;
            tracing::info!(id = %id, size, "pack entry migrating inline -> lazy");
        } else if !currently_inline && size <= MAX_INLINE_SIZE {
            self.invalid = true;
            tracing::info!(id = %id, size, "pack entry migrating lazy -> inline");
            self.content.insert(id.to_string(), ContentRef::Inline(data.clone()));
        }
        Some(data)
    }

    /// Serialize the pack to a single framed buffer.
    pub fn serialize(&self) -> Result<Vec<u8>, PackError> {
        let metadata = PackMetadata {
            version: self.version.clone(),
            etags: self.etags.clone(),
            unserializable: self.unserializable.clone(),
            last_access: self.last_access.clone(),
            build_snapshot: self.build_snapshot.clone(),
        };

        let mut writer = MeasuringWriter::begin_measure(Vec::new());
        let mut index: HashMap<String, IndexEntry> = HashMap::new();

        let mut ids: Vec<&String> = self.content.keys().collect();
        ids.sort();
        for id in ids {
            let content = &self.content[id];
            let offset = writer.bytes_written_so_far();
            let bytes = content.to_vec();
            writer.write_all(&bytes).map_err(|e| PackError::Io {
                path: format!("pack entry '{id}'"),
                reason: e.to_string(),
            })?;
            let len = writer.bytes_written_so_far() - offset;

            let entry = if content.is_lazy() {
                IndexEntry::Lazy { offset, len }
            } else if self.last_sizes.get(id).copied().unwrap_or(len as usize) <= MAX_INLINE_SIZE {
                IndexEntry::Inline { offset, len }
            } else {
                IndexEntry::Lazy { offset, len }
            };
            index.insert(id.clone(), entry);
        }
        let (data, _total_written) = writer.end_measure();

        let written = write_pack_file(&metadata, &data, &index)?;
        Ok(written.bytes)
    }

    /// Write the pack to `path` and return the byte count written.
    pub fn serialize_to_file(&self, path: &Utf8Path) -> Result<usize, PackError> {
        let bytes = self.serialize()?;
        std::fs::write(path.as_std_path(), &bytes)
            .map_err(|e| PackError::Io { path: path.to_string(), reason: e.to_string() })?;
        Ok(bytes.len())
    }

    /// Load a pack previously written by [`Self::serialize_to_file`].
    /// Lazy entries are backed by a shared mmap of `path`; inline entries
    /// are copied into memory and run through the migration policy
    /// immediately, mirroring `unpack(id, entry, currentlyInline=true)`.
    pub fn deserialize_from_file(path: &Utf8Path) -> Result<Self, PackError> {
        let mmap = open_mmap(path).map_err(|e| PackError::Mmap { path: path.to_string(), reason: e.to_string() })?;
        let parsed: cachekit_serde::ParsedPackFile<PackMetadata, HashMap<String, IndexEntry>> =
            read_pack_file(&mmap)?;

        let mut pack = Pack {
            version: parsed.metadata.version,
            etags: parsed.metadata.etags,
            content: HashMap::new(),
            last_access: parsed.metadata.last_access,
            last_sizes: HashMap::new(),
            unserializable: parsed.metadata.unserializable,
            used: HashSet::new(),
            invalid: false,
            build_snapshot: parsed.metadata.build_snapshot,
        };

        for (id, entry) in parsed.index {
            match entry {
                IndexEntry::Inline { offset, len } => {
                    let blob = LazyBlob::new(
                        std::sync::Arc::clone(&mmap),
                        parsed.data_offset + offset as usize,
                        len as usize,
                    );
                    let bytes = blob.bytes().to_vec();
                    if let Some(unpacked) = pack.unpack(&id, Some(bytes), true) {
                        pack.content.insert(id, ContentRef::Inline(unpacked));
                    }
                }
                IndexEntry::Lazy { offset, len } => {
                    let blob = LazyBlob::new(
                        std::sync::Arc::clone(&mmap),
                        parsed.data_offset + offset as usize,
                        len as usize,
                    );
                    pack.content.insert(id, ContentRef::Lazy(blob));
                }
            }
        }

        Ok(pack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips_with_matching_etag() {
        let mut pack = Pack::new("v1");
        pack.set("id-1", "etag-1", b"hello".to_vec());
        assert_eq!(pack.get("id-1", "etag-1"), Some(b"hello".to_vec()));
    }

    #[test]
    fn get_returns_none_on_etag_mismatch() {
        let mut pack = Pack::new("v1");
        pack.set("id-1", "etag-1", b"hello".to_vec());
        assert_eq!(pack.get("id-1", "etag-2"), None);
    }

    #[test]
    fn set_is_a_silent_no_op_for_unserializable_ids() {
        let mut pack = Pack::new("v1");
        pack.unserializable.insert("id-1".to_string());
        pack.set("id-1", "etag-1", b"hello".to_vec());
        assert_eq!(pack.get("id-1", "etag-1"), None);
        assert!(!pack.content.contains_key("id-1"));
    }

    #[test]
    fn collect_garbage_evicts_entries_past_max_age_and_keeps_recent_ones() {
        let mut pack = Pack::new("v1");
        pack.set("old", "e", b"x".to_vec());
        pack.set("new", "e", b"y".to_vec());
        pack.collect_garbage_at(1000, 0); // rolls `used` into last_access at t=0

        pack.used.insert("new".to_string());
        pack.collect_garbage_at(1000, 5000); // "old" is 5000ms stale, "new" just touched

        assert!(!pack.etags.contains_key("old"));
        assert!(pack.etags.contains_key("new"));
    }

    #[test]
    fn serialize_round_trips_inline_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("p.pack")).unwrap();

        let mut pack = Pack::new("v1");
        pack.set("a", "etag-a", b"small data".to_vec());
        pack.serialize_to_file(&path).unwrap();

        let mut loaded = Pack::deserialize_from_file(&path).unwrap();
        assert_eq!(loaded.version(), "v1");
        assert_eq!(loaded.get("a", "etag-a"), Some(b"small data".to_vec()));
        assert!(!loaded.is_invalid());
    }

    #[test]
    fn large_entry_serializes_as_lazy_and_stays_lazy_on_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("p.pack")).unwrap();

        let mut pack = Pack::new("v1");
        let big = vec![7u8; MAX_INLINE_SIZE + 1];
        pack.set("big", "etag-big", big.clone());
        pack.serialize_to_file(&path).unwrap();

        let mut loaded = Pack::deserialize_from_file(&path).unwrap();
        assert!(matches!(loaded.content.get("big"), Some(ContentRef::Lazy(_))));
        assert_eq!(loaded.get("big", "etag-big"), Some(big));
    }

    #[test]
    fn migration_from_inline_to_lazy_sets_invalid_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("p.pack")).unwrap();

        // Force an inline tag even though the payload exceeds MAX_INLINE_SIZE,
        // simulating data that grew between being tagged and being reloaded.
        let mut pack = Pack::new("v1");
        let big = vec![9u8; MAX_INLINE_SIZE + 500];
        pack.content.insert("x".to_string(), ContentRef::Inline(big.clone()));
        pack.etags.insert("x".to_string(), "e".to_string());
        pack.last_sizes.insert("x".to_string(), 10); // stale small size on purpose
        pack.serialize_to_file(&path).unwrap();

        let loaded = Pack::deserialize_from_file(&path).unwrap();
        assert!(loaded.is_invalid(), "migration from inline to lazy must mark the pack invalid");
    }

    #[test]
    fn stats_report_entry_and_byte_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("p.pack")).unwrap();

        let mut pack = Pack::new("v1");
        pack.set("a", "etag-a", b"hello".to_vec());
        let big = vec![1u8; MAX_INLINE_SIZE + 1];
        pack.set("b", "etag-b", big);
        pack.serialize_to_file(&path).unwrap();

        let loaded = Pack::deserialize_from_file(&path).unwrap();
        let stats = loaded.stats();
        assert_eq!(stats.version, "v1");
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.inline_count, 1);
        assert_eq!(stats.lazy_count, 1);
        assert_eq!(stats.total_inline_bytes, 5);
    }

    #[test]
    fn version_mismatch_is_a_caller_concern_not_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("p.pack")).unwrap();

        let pack = Pack::new("v1");
        pack.serialize_to_file(&path).unwrap();

        let loaded = Pack::deserialize_from_file(&path).unwrap();
        assert_eq!(loaded.version(), "v1");
        assert_ne!(loaded.version(), "v2");
    }
}
