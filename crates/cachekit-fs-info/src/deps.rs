//! `resolveBuildDependencies`: a work-queue that turns a context directory
//! plus a list of dependency specifiers into the concrete set of files and
//! directories a build touched, so they can be handed to `create_snapshot`.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};

use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::FsInfoError;
use crate::info::FileSystemInfo;

const RESOLVE_PARALLELISM: usize = 50;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildDependencies {
    pub files: Vec<Utf8PathBuf>,
    pub directories: Vec<Utf8PathBuf>,
    /// Populated by callers before snapshotting; the resolver itself never
    /// adds to this.
    pub missing: Vec<Utf8PathBuf>,
}

#[derive(Debug, Clone)]
enum WorkItem {
    Resolve { context: Utf8PathBuf, path: String },
    ResolveDirectory { context: Utf8PathBuf, path: String },
    File { path: Utf8PathBuf },
    Directory { path: Utf8PathBuf },
    FileDependencies { path: Utf8PathBuf },
    DirectoryDependencies { path: Utf8PathBuf },
}

pub async fn resolve_build_dependencies(
    fs_info: Arc<FileSystemInfo>,
    context: &Utf8Path,
    deps: &[String],
) -> Result<BuildDependencies, FsInfoError> {
    let files: Arc<StdMutex<HashSet<Utf8PathBuf>>> = Arc::new(StdMutex::new(HashSet::new()));
    let directories: Arc<StdMutex<HashSet<Utf8PathBuf>>> = Arc::new(StdMutex::new(HashSet::new()));
    let semaphore = Arc::new(Semaphore::new(RESOLVE_PARALLELISM));

    let mut queue: VecDeque<WorkItem> = deps
        .iter()
        .map(|d| WorkItem::Resolve { context: context.to_path_buf(), path: d.clone() })
        .collect();
    let mut join_set: JoinSet<Result<Vec<WorkItem>, FsInfoError>> = JoinSet::new();

    loop {
        while let Some(item) = queue.pop_front() {
            let fs_info = Arc::clone(&fs_info);
            let files = Arc::clone(&files);
            let directories = Arc::clone(&directories);
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
            join_set.spawn(async move {
                let _permit = permit;
                process_work_item(&fs_info, item, &files, &directories).await
            });
        }

        match join_set.join_next().await {
            Some(Ok(Ok(new_items))) => queue.extend(new_items),
            Some(Ok(Err(e))) => return Err(e),
            Some(Err(join_err)) => return Err(FsInfoError::from(join_err)),
            None => break,
        }
    }

    let files = files.lock().expect("mutex not poisoned").iter().cloned().collect();
    let directories = directories.lock().expect("mutex not poisoned").iter().cloned().collect();
    Ok(BuildDependencies { files, directories, missing: Vec::new() })
}

async fn process_work_item(
    fs_info: &FileSystemInfo,
    item: WorkItem,
    files: &StdMutex<HashSet<Utf8PathBuf>>,
    directories: &StdMutex<HashSet<Utf8PathBuf>>,
) -> Result<Vec<WorkItem>, FsInfoError> {
    match item {
        WorkItem::Resolve { context, path } => {
            let (target, is_deps) = match path.strip_prefix("deps:") {
                Some(rest) => (rest.to_string(), true),
                None => (path.clone(), false),
            };
            let is_directory_request = target.ends_with('/') || target.ends_with('\\');

            if is_directory_request {
                let trimmed = target.trim_end_matches(['/', '\\']);
                let resolved = fs_info.resolver.resolve_context(&context, trimmed).await?;
                Ok(vec![if is_deps {
                    WorkItem::DirectoryDependencies { path: resolved }
                } else {
                    WorkItem::Directory { path: resolved }
                }])
            } else {
                let resolved = fs_info.resolver.resolve(&context, &target).await?;
                Ok(vec![if is_deps {
                    WorkItem::FileDependencies { path: resolved }
                } else {
                    WorkItem::File { path: resolved }
                }])
            }
        }

        WorkItem::ResolveDirectory { context, path } => {
            let resolved = fs_info.resolver.resolve_context(&context, &path).await?;
            Ok(vec![WorkItem::Directory { path: resolved }])
        }

        WorkItem::File { path } => {
            let canonical = fs_info.fs.realpath(&path).await.unwrap_or(path);
            let inserted = files.lock().expect("mutex not poisoned").insert(canonical.clone());
            if inserted {
                Ok(vec![WorkItem::FileDependencies { path: canonical }])
            } else {
                Ok(vec![])
            }
        }

        WorkItem::Directory { path } => {
            let canonical = fs_info.fs.realpath(&path).await.unwrap_or(path);
            let inserted = directories.lock().expect("mutex not poisoned").insert(canonical.clone());
            if inserted {
                Ok(vec![WorkItem::DirectoryDependencies { path: canonical }])
            } else {
                Ok(vec![])
            }
        }

        WorkItem::FileDependencies { path } => match fs_info.module_children.children_of(&path) {
            Some(children) => Ok(children.into_iter().map(|p| WorkItem::File { path: p }).collect()),
            None => {
                let dir = path.parent().map(|p| p.to_path_buf()).unwrap_or(path);
                Ok(vec![WorkItem::Directory { path: dir }])
            }
        },

        WorkItem::DirectoryDependencies { path } => {
            let package_root = innermost_node_modules_package(&path);
            match ascend_to_manifest(fs_info, &package_root).await? {
                Some((root, manifest_bytes)) => {
                    let dependencies = parse_package_dependencies(&manifest_bytes)?;
                    Ok(dependencies
                        .into_keys()
                        .map(|name| WorkItem::ResolveDirectory { context: root.clone(), path: name })
                        .collect())
                }
                None => Ok(vec![]),
            }
        }
    }
}

/// Match the innermost `node_modules/[@scope/]pkg` prefix of `path` and
/// treat that as the package root, falling back to `path` itself when no
/// `node_modules` segment is present.
fn innermost_node_modules_package(path: &Utf8Path) -> Utf8PathBuf {
    let components: Vec<&str> = path.as_str().split('/').collect();
    if let Some(idx) = components.iter().rposition(|c| *c == "node_modules") {
        let scoped = components.get(idx + 1).map(|s| s.starts_with('@')).unwrap_or(false);
        let end = if scoped { idx + 3 } else { idx + 2 };
        if end <= components.len() {
            return Utf8PathBuf::from(components[..end].join("/"));
        }
    }
    path.to_path_buf()
}

async fn ascend_to_manifest(
    fs_info: &FileSystemInfo,
    start: &Utf8Path,
) -> Result<Option<(Utf8PathBuf, Vec<u8>)>, FsInfoError> {
    let mut current = start.to_path_buf();
    loop {
        let manifest_path = current.join("package.json");
        match fs_info.fs.read_file(&manifest_path).await {
            Ok(bytes) => return Ok(Some((current, bytes))),
            Err(e) if e.is_not_found() => match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok(None),
            },
            Err(e) => return Err(FsInfoError::Fs(e)),
        }
    }
}

fn parse_package_dependencies(bytes: &[u8]) -> Result<BTreeMap<String, String>, FsInfoError> {
    #[derive(serde::Deserialize, Default)]
    struct Manifest {
        #[serde(default)]
        dependencies: BTreeMap<String, String>,
    }
    let manifest: Manifest = serde_json::from_slice(bytes).map_err(|e| FsInfoError::ManifestParse {
        path: "package.json".to_string(),
        reason: e.to_string(),
    })?;
    Ok(manifest.dependencies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_the_innermost_node_modules_package_for_a_plain_name() {
        let path = Utf8Path::new("/repo/node_modules/leftpad/lib/index.js");
        assert_eq!(innermost_node_modules_package(path), Utf8PathBuf::from("/repo/node_modules/leftpad"));
    }

    #[test]
    fn finds_the_innermost_node_modules_package_for_a_scoped_name() {
        let path = Utf8Path::new("/repo/node_modules/@scope/pkg/lib/index.js");
        assert_eq!(
            innermost_node_modules_package(path),
            Utf8PathBuf::from("/repo/node_modules/@scope/pkg")
        );
    }

    #[test]
    fn falls_back_to_the_path_itself_outside_node_modules() {
        let path = Utf8Path::new("/repo/src/index.js");
        assert_eq!(innermost_node_modules_package(path), path.to_path_buf());
    }

    #[test]
    fn parses_dependency_names_from_a_manifest() {
        let manifest = br#"{"name":"x","dependencies":{"a":"^1.0.0","b":"^2.0.0"}}"#;
        let deps = parse_package_dependencies(manifest).unwrap();
        assert_eq!(deps.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
