//! Walk-up config file discovery, mirroring the teacher workspace's
//! config-discovery module: start at a directory and look for
//! `cachekit.toml`, checking each ancestor until the filesystem root.

use camino::{Utf8Path, Utf8PathBuf};

pub const CONFIG_FILE_NAME: &str = "cachekit.toml";

/// Find the nearest `cachekit.toml`, starting at `start_dir` and walking up
/// through its ancestors. Returns `None` if no such file exists anywhere on
/// the path to the root.
pub fn discover_config_file(start_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut dir = Some(start_dir.to_path_buf());
    while let Some(current) = dir {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = current.parent().map(|p| p.to_path_buf());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_a_config_file_in_the_starting_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), b"version = \"1\"").unwrap();
        let start = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

        assert_eq!(discover_config_file(&start), Some(start.join(CONFIG_FILE_NAME)));
    }

    #[test]
    fn finds_a_config_file_in_an_ancestor_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), b"version = \"1\"").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        let start = Utf8PathBuf::from_path_buf(nested).unwrap();

        assert_eq!(discover_config_file(&start), Some(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap().join(CONFIG_FILE_NAME)));
    }

    #[test]
    fn returns_none_when_no_ancestor_has_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let start = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        assert_eq!(discover_config_file(&start), None);
    }
}
