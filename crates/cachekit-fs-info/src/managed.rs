//! Managed-path folding: paths beneath a managed root (a package manager's
//! install directory) are summarized as one `name@version` fact per package
//! rather than tracked file-by-file.
//!
//! The cut point is the first path separator below the root, except when
//! the first segment is a scope (`@scope/name`), in which case the cut
//! point is the *second* separator so the scope and package name stay
//! together as one item.

use camino::{Utf8Path, Utf8PathBuf};

/// If `path` lies beneath `root`, return the managed item directory that
/// owns it. Returns `None` if `path` is not under `root`, or is `root`
/// itself with nothing beneath it.
pub fn managed_item_root(root: &Utf8Path, path: &Utf8Path) -> Option<Utf8PathBuf> {
    let rel = path.strip_prefix(root).ok()?;
    let rel_str = rel.as_str().trim_start_matches('/');
    if rel_str.is_empty() {
        return None;
    }

    let first_slash = rel_str.find('/')?;
    let cut = if rel_str.starts_with('@') {
        // scoped package: cut at the second separator, so "@scope" and the
        // package name underneath it stay joined as one item.
        rel_str[first_slash + 1..].find('/').map(|i| first_slash + 1 + i)?
    } else {
        first_slash
    };

    Some(root.join(&rel_str[..cut]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_a_plain_package_subpath_to_its_package_directory() {
        let root = Utf8Path::new("/node_modules");
        let path = Utf8Path::new("/node_modules/leftpad/lib/index.js");
        assert_eq!(managed_item_root(root, path), Some(Utf8PathBuf::from("/node_modules/leftpad")));
    }

    #[test]
    fn folds_a_scoped_package_subpath_keeping_scope_and_name_together() {
        let root = Utf8Path::new("/node_modules");
        let path = Utf8Path::new("/node_modules/@scope/pkg/lib/x.js");
        assert_eq!(managed_item_root(root, path), Some(Utf8PathBuf::from("/node_modules/@scope/pkg")));
    }

    #[test]
    fn returns_none_for_paths_not_under_the_root() {
        let root = Utf8Path::new("/node_modules");
        let path = Utf8Path::new("/src/index.js");
        assert_eq!(managed_item_root(root, path), None);
    }

    #[test]
    fn returns_none_when_path_is_exactly_the_root() {
        let root = Utf8Path::new("/node_modules");
        assert_eq!(managed_item_root(root, root), None);
    }
}
