//! `FileSystemInfo`: unbounded, process-lifetime fact caches over files,
//! directories, and managed packages, each backed by a dedicated coalescing
//! queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use camino::{Utf8Path, Utf8PathBuf};
use unicode_normalization::UnicodeNormalization;

use cachekit_async_queue::AsyncQueue;
use cachekit_resolver::{ModuleChildren, Resolver};
use cachekit_vfs::InputFileSystem;

use crate::accuracy::AccuracyEstimator;
use crate::error::FsInfoError;
use crate::fact::{Fact, FsEntry};
use crate::snapshot::{CreateSnapshotOptions, Snapshot};

const FILE_TIMESTAMP_PARALLELISM: usize = 30;
const FILE_HASH_PARALLELISM: usize = 10;
const CONTEXT_TIMESTAMP_PARALLELISM: usize = 2;
const CONTEXT_HASH_PARALLELISM: usize = 2;
const MANAGED_ITEM_PARALLELISM: usize = 10;

pub struct FileSystemInfo {
    pub(crate) fs: Arc<dyn InputFileSystem>,
    pub(crate) resolver: Arc<dyn Resolver>,
    pub(crate) module_children: Arc<dyn ModuleChildren>,
    managed_paths: Vec<Utf8PathBuf>,
    accuracy: Arc<AccuracyEstimator>,

    file_timestamps: StdMutex<HashMap<Utf8PathBuf, Fact<FsEntry>>>,
    file_timestamp_queue: AsyncQueue<Utf8PathBuf, Fact<FsEntry>, FsInfoError>,

    file_hashes: StdMutex<HashMap<Utf8PathBuf, Fact<String>>>,
    file_hash_queue: AsyncQueue<Utf8PathBuf, Fact<String>, FsInfoError>,

    context_timestamps: StdMutex<HashMap<Utf8PathBuf, Fact<FsEntry>>>,
    #[allow(dead_code)]
    context_timestamp_queue: AsyncQueue<Utf8PathBuf, Fact<FsEntry>, FsInfoError>,

    context_hashes: StdMutex<HashMap<Utf8PathBuf, Fact<String>>>,
    context_hash_queue: AsyncQueue<Utf8PathBuf, Fact<String>, FsInfoError>,

    /// Never written to on a successful read; kept so a future caller could
    /// pre-seed it without changing the read path.
    managed_items: StdMutex<HashMap<Utf8PathBuf, String>>,
    managed_item_queue: AsyncQueue<Utf8PathBuf, String, FsInfoError>,
}

impl FileSystemInfo {
    pub fn new(
        fs: Arc<dyn InputFileSystem>,
        resolver: Arc<dyn Resolver>,
        module_children: Arc<dyn ModuleChildren>,
        managed_paths: Vec<Utf8PathBuf>,
    ) -> Arc<Self> {
        Arc::new(Self {
            fs,
            resolver,
            module_children,
            managed_paths,
            accuracy: Arc::new(AccuracyEstimator::new()),
            file_timestamps: StdMutex::new(HashMap::new()),
            file_timestamp_queue: AsyncQueue::new(FILE_TIMESTAMP_PARALLELISM),
            file_hashes: StdMutex::new(HashMap::new()),
            file_hash_queue: AsyncQueue::new(FILE_HASH_PARALLELISM),
            context_timestamps: StdMutex::new(HashMap::new()),
            context_timestamp_queue: AsyncQueue::new(CONTEXT_TIMESTAMP_PARALLELISM),
            context_hashes: StdMutex::new(HashMap::new()),
            context_hash_queue: AsyncQueue::new(CONTEXT_HASH_PARALLELISM),
            managed_items: StdMutex::new(HashMap::new()),
            managed_item_queue: AsyncQueue::new(MANAGED_ITEM_PARALLELISM),
        })
    }

    pub fn accuracy_ms(&self) -> i64 {
        self.accuracy.current()
    }

    pub fn add_file_timestamps(&self, entries: impl IntoIterator<Item = (Utf8PathBuf, FsEntry)>) {
        let mut cache = self.file_timestamps.lock().expect("mutex not poisoned");
        for (path, entry) in entries {
            cache.insert(path, Fact::Present(entry));
        }
    }

    pub fn add_context_timestamps(&self, entries: impl IntoIterator<Item = (Utf8PathBuf, FsEntry)>) {
        let mut cache = self.context_timestamps.lock().expect("mutex not poisoned");
        for (path, entry) in entries {
            cache.insert(path, Fact::Present(entry));
        }
    }

    pub async fn get_file_timestamp(&self, path: &Utf8Path) -> Result<Fact<FsEntry>, FsInfoError> {
        if let Some(cached) = self.file_timestamps.lock().expect("mutex not poisoned").get(path).cloned() {
            return Ok(cached);
        }
        let fs = Arc::clone(&self.fs);
        let accuracy = Arc::clone(&self.accuracy);
        let path_owned = path.to_path_buf();
        let result = self
            .file_timestamp_queue
            .add(path.to_path_buf(), move || {
                let path_owned = path_owned.clone();
                async move { read_file_timestamp(fs.as_ref(), accuracy.as_ref(), &path_owned).await }
            })
            .await?;
        self.file_timestamps.lock().expect("mutex not poisoned").insert(path.to_path_buf(), result.clone());
        Ok(result)
    }

    pub async fn get_file_hash(&self, path: &Utf8Path) -> Result<Fact<String>, FsInfoError> {
        if let Some(cached) = self.file_hashes.lock().expect("mutex not poisoned").get(path).cloned() {
            return Ok(cached);
        }
        let fs = Arc::clone(&self.fs);
        let path_owned = path.to_path_buf();
        let result = self
            .file_hash_queue
            .add(path.to_path_buf(), move || {
                let fs = Arc::clone(&fs);
                let path_owned = path_owned.clone();
                async move { read_file_hash(fs.as_ref(), &path_owned).await }
            })
            .await?;
        self.file_hashes.lock().expect("mutex not poisoned").insert(path.to_path_buf(), result.clone());
        Ok(result)
    }

    /// Reserved: the source stubs context-timestamp tracking to always
    /// "not present", which in turn makes any snapshot carrying a
    /// context-timestamp entry permanently invalid.
    pub async fn get_context_timestamp(&self, _path: &Utf8Path) -> Result<Fact<FsEntry>, FsInfoError> {
        Ok(Fact::Missing)
    }

    /// Takes an owned `Arc` (rather than `&self`) because computing a
    /// directory's hash may recurse into a child directory's hash, and that
    /// recursive call has to own a reference to `self` good for `'static` to
    /// be spawned onto the runtime by the coalescing queue.
    pub async fn get_context_hash(self: Arc<Self>, path: &Utf8Path) -> Result<Fact<String>, FsInfoError> {
        if let Some(cached) = self.context_hashes.lock().expect("mutex not poisoned").get(path).cloned() {
            return Ok(cached);
        }
        let fs_info = Arc::clone(&self);
        let path_owned = path.to_path_buf();
        let result = self
            .context_hash_queue
            .add(path.to_path_buf(), move || {
                let fs_info = Arc::clone(&fs_info);
                let path_owned = path_owned.clone();
                async move { compute_context_hash(fs_info, path_owned).await }
            })
            .await?;
        self.context_hashes.lock().expect("mutex not poisoned").insert(path.to_path_buf(), result.clone());
        Ok(result)
    }

    pub async fn get_managed_item_info(&self, item_path: &Utf8Path) -> Result<String, FsInfoError> {
        if let Some(cached) = self.managed_items.lock().expect("mutex not poisoned").get(item_path).cloned() {
            return Ok(cached);
        }
        let fs = Arc::clone(&self.fs);
        let item_owned = item_path.to_path_buf();
        self.managed_item_queue
            .add(item_path.to_path_buf(), move || {
                let fs = Arc::clone(&fs);
                let item_owned = item_owned.clone();
                async move { read_managed_item_info(fs.as_ref(), &item_owned).await }
            })
            .await
    }

    fn fold_managed_path(&self, path: &Utf8Path) -> Option<Utf8PathBuf> {
        self.managed_paths.iter().find_map(|root| crate::managed::managed_item_root(root, path))
    }

    /// Takes an owned `Arc` because hashing a directory may call
    /// `get_context_hash`, which itself needs to own a `'static` reference to
    /// `self` to recurse through the coalescing queue.
    pub async fn create_snapshot(
        self: Arc<Self>,
        start_time: Option<i64>,
        files: &[Utf8PathBuf],
        directories: &[Utf8PathBuf],
        missing: &[Utf8PathBuf],
        options: CreateSnapshotOptions,
    ) -> Snapshot {
        use std::collections::HashSet;

        // A plain `&FileSystemInfo` is `Copy`, so it can be moved into as
        // many per-item `async move` blocks as `join_all` needs; only the
        // recursive `get_context_hash` call below needs its own owned `Arc`.
        let info: &FileSystemInfo = &self;

        let mut snapshot = Snapshot { start_time, ..Default::default() };
        let mut managed_item_paths: HashSet<Utf8PathBuf> = HashSet::new();
        let mut plain_files = Vec::new();
        let mut plain_dirs = Vec::new();

        for f in files {
            match info.fold_managed_path(f) {
                Some(item) => {
                    managed_item_paths.insert(item);
                }
                None => plain_files.push(f.clone()),
            }
        }
        for d in directories {
            match info.fold_managed_path(d) {
                Some(item) => {
                    managed_item_paths.insert(item);
                }
                None => plain_dirs.push(d.clone()),
            }
        }

        if options.hash {
            for (path, result) in futures::future::join_all(plain_files.iter().map(|f| async move {
                (f.clone(), info.get_file_hash(f).await)
            }))
            .await
            {
                snapshot.file_hashes.insert(path, result.unwrap_or(Fact::Error));
            }
            for (path, result) in futures::future::join_all(plain_dirs.iter().map(|d| {
                let fs_info = Arc::clone(&self);
                async move { (d.clone(), fs_info.get_context_hash(d).await) }
            }))
            .await
            {
                snapshot.context_hashes.insert(path, result.unwrap_or(Fact::Error));
            }
        } else {
            for (path, result) in futures::future::join_all(plain_files.iter().map(|f| async move {
                (f.clone(), info.get_file_timestamp(f).await)
            }))
            .await
            {
                snapshot.file_timestamps.insert(path, result.unwrap_or(Fact::Error));
            }
            for d in &plain_dirs {
                snapshot.context_timestamps.insert(d.clone(), Fact::Error);
            }
        }

        for (path, result) in futures::future::join_all(
            missing.iter().map(|m| async move { (m.clone(), info.get_file_timestamp(m).await) }),
        )
        .await
        {
            snapshot.missing_timestamps.insert(path, result.unwrap_or(Fact::Error));
        }

        for (path, result) in futures::future::join_all(managed_item_paths.iter().map(|item| async move {
            (item.clone(), info.get_managed_item_info(item).await)
        }))
        .await
        {
            let fact = match result {
                Ok(info) => Fact::Present(info),
                Err(_) => Fact::Error,
            };
            snapshot.managed_item_info.insert(path, fact);
        }

        snapshot
    }

    /// Returns `true` iff every fact the snapshot recorded still holds.
    ///
    /// Checks run in field order and return as soon as one fails — there is
    /// no need for the source's explicit short-circuit flag here because
    /// `?`/early-return already stop us from issuing any further reads.
    pub async fn check_snapshot_valid(self: Arc<Self>, snapshot: &Snapshot) -> Result<bool, FsInfoError> {
        if !snapshot.context_timestamps.is_empty() {
            tracing::debug!("snapshot invalid: contains a context-timestamp entry (fail-closed stub)");
            return Ok(false);
        }

        let start_time = snapshot.start_time.unwrap_or(i64::MAX);

        for (path, snap) in &snapshot.file_timestamps {
            if !self.check_file(path, snap, start_time).await {
                tracing::debug!(path = %path, predicate = "check_file", "snapshot invalid");
                return Ok(false);
            }
        }
        for (path, snap) in &snapshot.file_hashes {
            if !self.check_hash_file(path, snap).await {
                tracing::debug!(path = %path, predicate = "check_hash_file", "snapshot invalid");
                return Ok(false);
            }
        }
        for (path, snap) in &snapshot.context_hashes {
            if !Arc::clone(&self).check_hash_context(path, snap).await {
                tracing::debug!(path = %path, predicate = "check_hash_context", "snapshot invalid");
                return Ok(false);
            }
        }
        for (path, snap) in &snapshot.missing_timestamps {
            if !self.check_existence(path, snap).await {
                tracing::debug!(path = %path, predicate = "check_existence", "snapshot invalid");
                return Ok(false);
            }
        }
        for (path, snap) in &snapshot.managed_item_info {
            if !self.check_managed_item(path, snap).await {
                tracing::debug!(path = %path, predicate = "check_managed_item", "snapshot invalid");
                return Ok(false);
            }
        }

        Ok(true)
    }

    async fn check_file(&self, path: &Utf8Path, snap: &Fact<FsEntry>, start_time: i64) -> bool {
        if snap.is_error() {
            return false;
        }
        let current = match self.get_file_timestamp(path).await {
            Ok(c) => c,
            Err(_) => return false,
        };
        match (current, snap) {
            (Fact::Missing, Fact::Missing) => true,
            (Fact::Present(cur), Fact::Present(snap_entry)) => {
                if cur.safe_time > start_time {
                    return false;
                }
                match snap_entry.timestamp {
                    Some(snap_ts) => cur.timestamp == Some(snap_ts),
                    None => true,
                }
            }
            _ => false,
        }
    }

    async fn check_hash_file(&self, path: &Utf8Path, snap: &Fact<String>) -> bool {
        if snap.is_error() {
            return false;
        }
        match self.get_file_hash(path).await {
            Ok(current) => &current == snap,
            Err(_) => false,
        }
    }

    async fn check_hash_context(self: Arc<Self>, path: &Utf8Path, snap: &Fact<String>) -> bool {
        if snap.is_error() {
            return false;
        }
        match self.get_context_hash(path).await {
            Ok(current) => &current == snap,
            Err(_) => false,
        }
    }

    async fn check_existence(&self, path: &Utf8Path, snap: &Fact<FsEntry>) -> bool {
        if snap.is_error() {
            return false;
        }
        let current = self.get_file_timestamp(path).await.unwrap_or(Fact::Error);
        matches!(
            (&current, snap),
            (Fact::Missing, Fact::Missing) | (Fact::Present(_), Fact::Present(_))
        )
    }

    async fn check_managed_item(&self, path: &Utf8Path, snap: &Fact<String>) -> bool {
        if snap.is_error() {
            return false;
        }
        let current = match self.get_managed_item_info(path).await {
            Ok(info) => Fact::Present(info),
            Err(_) => Fact::Error,
        };
        &current == snap
    }
}

async fn read_file_timestamp(
    fs: &dyn InputFileSystem,
    accuracy: &AccuracyEstimator,
    path: &Utf8Path,
) -> Result<Fact<FsEntry>, FsInfoError> {
    match fs.stat(path).await {
        Ok(meta) => {
            let mtime = meta.mtime_ms.unwrap_or(0);
            if mtime == 0 {
                return Ok(Fact::Present(FsEntry { safe_time: FsEntry::INFINITE_SAFE_TIME, timestamp: None }));
            }
            accuracy.observe(mtime);
            let safe_time = mtime.saturating_add(accuracy.current());
            Ok(Fact::Present(FsEntry { safe_time, timestamp: Some(mtime) }))
        }
        Err(e) if e.is_not_found() => Ok(Fact::Missing),
        Err(e) => {
            tracing::debug!(path = %path, error = %e, "stat failed, path will read as an error fact");
            Err(FsInfoError::Fs(e))
        }
    }
}

async fn read_file_hash(fs: &dyn InputFileSystem, path: &Utf8Path) -> Result<Fact<String>, FsInfoError> {
    match fs.read_file(path).await {
        Ok(bytes) => Ok(Fact::Present(cachekit_hash::hash_bytes(&bytes))),
        Err(e) if e.is_not_found() => Ok(Fact::Missing),
        Err(e) => {
            tracing::debug!(path = %path, error = %e, "read failed, path will read as an error fact");
            Err(FsInfoError::Fs(e))
        }
    }
}

async fn read_managed_item_info(fs: &dyn InputFileSystem, item_path: &Utf8Path) -> Result<String, FsInfoError> {
    let manifest_path = item_path.join("package.json");
    let bytes = fs.read_file(&manifest_path).await.map_err(FsInfoError::Fs)?;

    #[derive(serde::Deserialize, Default)]
    struct Manifest {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        version: Option<String>,
    }
    let manifest: Manifest = serde_json::from_slice(&bytes).map_err(|e| FsInfoError::ManifestParse {
        path: manifest_path.to_string(),
        reason: e.to_string(),
    })?;
    Ok(format!("{}@{}", manifest.name.unwrap_or_default(), manifest.version.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Mutex as StdTestMutex;

    use async_trait::async_trait;
    use cachekit_resolver::{NoModuleChildren, ResolveError, Resolver};
    use cachekit_vfs::{FsError, FsMetadata, InputFileSystem};

    #[derive(Clone)]
    enum Node {
        File { bytes: Vec<u8>, mtime_ms: i64 },
        Dir { children: Vec<String> },
    }

    #[derive(Default)]
    struct FakeFs {
        nodes: StdTestMutex<StdHashMap<Utf8PathBuf, Node>>,
    }

    impl FakeFs {
        fn new() -> Self {
            Self::default()
        }

        fn put_file(&self, path: &str, bytes: &[u8], mtime_ms: i64) {
            self.nodes
                .lock()
                .unwrap()
                .insert(Utf8PathBuf::from(path), Node::File { bytes: bytes.to_vec(), mtime_ms });
        }

        fn put_dir(&self, path: &str, children: &[&str]) {
            self.nodes.lock().unwrap().insert(
                Utf8PathBuf::from(path),
                Node::Dir { children: children.iter().map(|s| s.to_string()).collect() },
            );
        }
    }

    #[async_trait]
    impl InputFileSystem for FakeFs {
        async fn stat(&self, path: &Utf8Path) -> Result<FsMetadata, FsError> {
            match self.nodes.lock().unwrap().get(path) {
                Some(Node::File { mtime_ms, .. }) => {
                    Ok(FsMetadata { mtime_ms: Some(*mtime_ms), is_file: true, is_dir: false })
                }
                Some(Node::Dir { .. }) => Ok(FsMetadata { mtime_ms: None, is_file: false, is_dir: true }),
                None => Err(FsError::NotFound { path: path.to_string() }),
            }
        }

        async fn read_file(&self, path: &Utf8Path) -> Result<Vec<u8>, FsError> {
            match self.nodes.lock().unwrap().get(path) {
                Some(Node::File { bytes, .. }) => Ok(bytes.clone()),
                _ => Err(FsError::NotFound { path: path.to_string() }),
            }
        }

        async fn read_dir(&self, path: &Utf8Path) -> Result<Vec<String>, FsError> {
            match self.nodes.lock().unwrap().get(path) {
                Some(Node::Dir { children }) => Ok(children.clone()),
                _ => Err(FsError::NotFound { path: path.to_string() }),
            }
        }

        async fn realpath(&self, path: &Utf8Path) -> Result<Utf8PathBuf, FsError> {
            Ok(path.to_path_buf())
        }
    }

    struct NoopResolver;

    #[async_trait]
    impl Resolver for NoopResolver {
        async fn resolve(&self, context: &Utf8Path, request: &str) -> Result<Utf8PathBuf, ResolveError> {
            Err(ResolveError::NotFound { context: context.to_string(), request: request.to_string() })
        }
        async fn resolve_context(&self, context: &Utf8Path, request: &str) -> Result<Utf8PathBuf, ResolveError> {
            Err(ResolveError::NotFound { context: context.to_string(), request: request.to_string() })
        }
    }

    fn info_with(fs: FakeFs, managed_paths: Vec<Utf8PathBuf>) -> Arc<FileSystemInfo> {
        FileSystemInfo::new(Arc::new(fs), Arc::new(NoopResolver), Arc::new(NoModuleChildren), managed_paths)
    }

    // S1: cache hit on an unchanged file stays valid without touching the fs.
    #[tokio::test]
    async fn s1_cache_hit_on_unchanged_file_is_valid() {
        let info = info_with(FakeFs::new(), vec![]);
        info.add_file_timestamps([(Utf8PathBuf::from("/a"), FsEntry { safe_time: 1000, timestamp: Some(500) })]);

        let mut snapshot = Snapshot { start_time: Some(2000), ..Default::default() };
        snapshot
            .file_timestamps
            .insert(Utf8PathBuf::from("/a"), Fact::Present(FsEntry { safe_time: 1000, timestamp: Some(500) }));

        assert!(info.check_snapshot_valid(&snapshot).await.unwrap());
    }

    // S2: a file modified within the accuracy window of startTime invalidates.
    #[tokio::test]
    async fn s2_modified_within_window_is_rejected() {
        let fs = FakeFs::new();
        fs.put_file("/a", b"content", 2500);
        let info = info_with(fs, vec![]);

        // Prime the accuracy estimator toward the 2000ms default by reading
        // the file once before snapshotting, mirroring how a real build would
        // have already observed this mtime.
        let _ = info.get_file_timestamp(Utf8Path::new("/a")).await.unwrap();

        let mut snapshot = Snapshot { start_time: Some(2000), ..Default::default() };
        snapshot
            .file_timestamps
            .insert(Utf8PathBuf::from("/a"), Fact::Present(FsEntry { safe_time: 4500, timestamp: Some(2500) }));

        assert!(!info.check_snapshot_valid(&snapshot).await.unwrap());
    }

    // S3: managed paths fold into one managed-item fact, never per-file ones.
    #[tokio::test]
    async fn s3_managed_paths_fold_into_one_item() {
        let fs = FakeFs::new();
        fs.put_file("/node_modules/@scope/pkg/package.json", br#"{"name":"@scope/pkg","version":"1.2.3"}"#, 1);
        let info = info_with(fs, vec![Utf8PathBuf::from("/node_modules")]);

        let files = vec![
            Utf8PathBuf::from("/node_modules/@scope/pkg/lib/x.js"),
            Utf8PathBuf::from("/node_modules/@scope/pkg/lib/y.js"),
        ];
        let snapshot = info
            .clone()
            .create_snapshot(Some(100), &files, &[], &[], CreateSnapshotOptions::default())
            .await;

        assert!(snapshot.file_timestamps.is_empty());
        assert!(snapshot.file_hashes.is_empty());
        assert_eq!(snapshot.managed_item_info.len(), 1);
        assert_eq!(
            snapshot.managed_item_info.get(&Utf8PathBuf::from("/node_modules/@scope/pkg")),
            Some(&Fact::Present("@scope/pkg@1.2.3".to_string()))
        );
    }

    // S4: hash-mode directory snapshot is the hash of sorted names + child hashes.
    #[tokio::test]
    async fn s4_hash_mode_directory_matches_the_sorted_child_digest() {
        let fs = FakeFs::new();
        fs.put_dir("/d", &["a.txt", ".hidden", "sub"]);
        fs.put_file("/d/a.txt", b"hello", 1);
        fs.put_dir("/d/sub", &[]);
        let info = info_with(fs, vec![]);

        let snapshot = info
            .clone()
            .create_snapshot(
                Some(100),
                &[],
                &[Utf8PathBuf::from("/d")],
                &[],
                CreateSnapshotOptions { hash: true },
            )
            .await;

        let got = snapshot.context_hashes.get(&Utf8PathBuf::from("/d")).unwrap();
        let a_hash = cachekit_hash::hash_bytes(b"hello");
        let sub_hash = cachekit_hash::hash_context(std::iter::empty(), &[]);
        let expected = cachekit_hash::hash_context(["a.txt", "sub"].into_iter(), &[a_hash, sub_hash]);
        assert_eq!(got, &Fact::Present(expected));
    }

    #[tokio::test]
    async fn missing_path_is_a_positive_cached_absence_not_an_error() {
        let info = info_with(FakeFs::new(), vec![]);
        let fact = info.get_file_timestamp(Utf8Path::new("/nope")).await.unwrap();
        assert_eq!(fact, Fact::Missing);
    }

    #[tokio::test]
    async fn context_timestamp_snapshot_is_always_invalid() {
        let info = info_with(FakeFs::new(), vec![]);
        let mut snapshot = Snapshot { start_time: Some(1), ..Default::default() };
        snapshot.context_timestamps.insert(Utf8PathBuf::from("/d"), Fact::Missing);
        assert!(!info.check_snapshot_valid(&snapshot).await.unwrap());
    }

    #[tokio::test]
    async fn snapshot_with_error_fact_is_always_invalid() {
        let info = info_with(FakeFs::new(), vec![]);
        let mut snapshot = Snapshot { start_time: Some(1), ..Default::default() };
        snapshot.file_hashes.insert(Utf8PathBuf::from("/a"), Fact::Error);
        assert!(!info.check_snapshot_valid(&snapshot).await.unwrap());
    }
}

async fn compute_context_hash(fs_info: Arc<FileSystemInfo>, path: Utf8PathBuf) -> Result<Fact<String>, FsInfoError> {
    let names = match fs_info.fs.read_dir(&path).await {
        Ok(names) => names,
        Err(e) if e.is_not_found() => return Ok(Fact::Missing),
        Err(e) => return Err(FsInfoError::Fs(e)),
    };

    let mut normalized: Vec<String> =
        names.into_iter().map(|n| n.nfc().collect::<String>()).filter(|n| !n.starts_with('.')).collect();
    normalized.sort();

    // Raise the budget before recursing so a recursive context-hash call
    // under the default parallelism of 2 cannot self-deadlock.
    fs_info.context_hash_queue.increase_parallelism();
    let mut child_hashes = Vec::with_capacity(normalized.len());
    for name in &normalized {
        let child_path = path.join(name);
        let hash = match fs_info.fs.stat(&child_path).await {
            Ok(meta) if meta.is_dir => match Arc::clone(&fs_info).get_context_hash(&child_path).await {
                Ok(Fact::Present(h)) => h,
                _ => String::new(),
            },
            Ok(_) => match fs_info.get_file_hash(&child_path).await {
                Ok(Fact::Present(h)) => h,
                _ => String::new(),
            },
            Err(_) => String::new(),
        };
        child_hashes.push(hash);
    }
    fs_info.context_hash_queue.decrease_parallelism();

    Ok(Fact::Present(cachekit_hash::hash_context(normalized.iter().map(String::as_str), &child_hashes)))
}
