//! The `Resolver` external collaborator contract, plus the
//! `require.cache`-style `ModuleChildren` collaborator, and one minimal
//! concrete implementation of each.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use cachekit_vfs::{FsError, InputFileSystem};

#[derive(Debug, Error, Clone)]
pub enum ResolveError {
    #[error("could not resolve '{request}' from '{context}'")]
    NotFound { context: String, request: String },

    #[error("filesystem error while resolving '{request}': {source}")]
    Fs {
        request: String,
        #[source]
        source: FsError,
    },
}

/// The `Resolver` contract: turn a bare or relative specifier into an
/// absolute file path (`resolve`) or an absolute directory path
/// (`resolve_context`), relative to a context directory.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, context: &Utf8Path, request: &str) -> Result<Utf8PathBuf, ResolveError>;
    async fn resolve_context(&self, context: &Utf8Path, request: &str) -> Result<Utf8PathBuf, ResolveError>;
}

/// A minimal `node_modules`-style resolver: enough for
/// `resolveBuildDependencies`'s `directory-dependencies` walk to have a real
/// default, not a full resolution algorithm (conditions, exports maps, and
/// the like are out of scope).
pub struct SimpleResolver<F> {
    fs: F,
}

impl<F: InputFileSystem> SimpleResolver<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    fn is_bare_specifier(request: &str) -> bool {
        !(request.starts_with('.') || request.starts_with('/'))
    }

    async fn probe_file_candidates(&self, base: &Utf8Path) -> Option<Utf8PathBuf> {
        let candidates = [
            base.to_path_buf(),
            Utf8PathBuf::from(format!("{base}.js")),
            base.join("index.js"),
        ];
        for candidate in candidates {
            if self.fs.stat(&candidate).await.is_ok() {
                return Some(candidate);
            }
        }
        None
    }
}

#[async_trait]
impl<F: InputFileSystem> Resolver for SimpleResolver<F> {
    async fn resolve(&self, context: &Utf8Path, request: &str) -> Result<Utf8PathBuf, ResolveError> {
        if Self::is_bare_specifier(request) {
            let mut dir = context.to_path_buf();
            loop {
                let candidate_root = dir.join("node_modules").join(request);
                if let Some(found) = self.probe_file_candidates(&candidate_root).await {
                    return Ok(found);
                }
                match dir.parent() {
                    Some(parent) => dir = parent.to_path_buf(),
                    None => {
                        return Err(ResolveError::NotFound {
                            context: context.to_string(),
                            request: request.to_string(),
                        })
                    }
                }
            }
        } else {
            let joined = context.join(request);
            self.probe_file_candidates(&joined)
                .await
                .ok_or_else(|| ResolveError::NotFound {
                    context: context.to_string(),
                    request: request.to_string(),
                })
        }
    }

    async fn resolve_context(&self, context: &Utf8Path, request: &str) -> Result<Utf8PathBuf, ResolveError> {
        let candidate = if Self::is_bare_specifier(request) {
            let mut dir = context.to_path_buf();
            loop {
                let candidate_root = dir.join("node_modules").join(request);
                if self.fs.stat(&candidate_root).await.is_ok() {
                    break candidate_root;
                }
                match dir.parent() {
                    Some(parent) => dir = parent.to_path_buf(),
                    None => {
                        return Err(ResolveError::NotFound {
                            context: context.to_string(),
                            request: request.to_string(),
                        })
                    }
                }
            }
        } else {
            context.join(request)
        };

        self.fs
            .stat(&candidate)
            .await
            .map(|_| candidate)
            .map_err(|source| ResolveError::Fs { request: request.to_string(), source })
    }
}

/// The `require.cache`-style collaborator: given a file path, optionally
/// report the set of paths it is known to depend on (its "children"), so the
/// `file-dependencies` step of `resolveBuildDependencies` doesn't have to
/// over-approximate with "the whole containing directory". There is no
/// portable stdlib equivalent, so this is left as an explicit trait the host
/// loader can implement.
pub trait ModuleChildren: Send + Sync {
    fn children_of(&self, path: &Utf8Path) -> Option<Vec<Utf8PathBuf>>;
}

/// The default: no child introspection available, which causes the caller
/// to fall back to treating the containing directory as a dependency.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModuleChildren;

impl ModuleChildren for NoModuleChildren {
    fn children_of(&self, _path: &Utf8Path) -> Option<Vec<Utf8PathBuf>> {
        None
    }
}
