//! Per-container host directories mounted at `/shared`.

use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use bcx_harness_common::mutex_lock_or_recover;
use tracing::debug;
use tracing::warn;

use crate::config::SHARED_MOUNT;
use crate::error::Result;
use crate::teardown::TeardownRegistry;

/// Allocates one subdirectory of `root` per container id.
#[derive(Debug)]
pub struct SharedVolumes {
    root: PathBuf,
    known: Mutex<HashSet<String>>,
}

impl SharedVolumes {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            known: Mutex::new(HashSet::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory for `id`, creating it (and the root) on first
    /// use. A new directory gets a removal hook in `teardown`.
    pub fn dir_for(&self, id: &str, teardown: &TeardownRegistry) -> Result<PathBuf> {
        let dir = self.root.join(id);
        let mut known = mutex_lock_or_recover(&self.known);
        if known.contains(id) {
            return Ok(dir);
        }

        std::fs::create_dir_all(&self.root)?;
        if !dir.exists() {
            std::fs::create_dir(&dir)?;
            debug!(path = %dir.display(), "Shared directory created");
            let hook_dir = dir.clone();
            teardown.register(format!("remove shared dir {id}"), move || {
                remove_if_empty(&hook_dir)
            });
        }
        known.insert(id.to_string());
        Ok(dir)
    }
}

fn remove_if_empty(dir: &Path) -> anyhow::Result<()> {
    match std::fs::remove_dir(dir) {
        Ok(()) => {
            debug!(path = %dir.display(), "Shared directory removed");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::DirectoryNotEmpty => {
            warn!(path = %dir.display(), "Shared directory not empty; leaving it in place");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// `/shared/<filename>`.
pub fn path_in_container(filename: &str) -> String {
    format!("{SHARED_MOUNT}/{}", filename.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_for_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let volumes = SharedVolumes::new(tmp.path().join("shared"));
        let teardown = TeardownRegistry::new();

        let first = volumes.dir_for("abc", &teardown).unwrap();
        let second = volumes.dir_for("abc", &teardown).unwrap();

        assert_eq!(first, second);
        assert!(first.is_dir());
        assert_eq!(teardown.pending(), 1);
    }

    #[test]
    fn test_directories_are_partitioned_by_id() {
        let tmp = tempfile::tempdir().unwrap();
        let volumes = SharedVolumes::new(tmp.path());
        let teardown = TeardownRegistry::new();

        let a = volumes.dir_for("a", &teardown).unwrap();
        let b = volumes.dir_for("b", &teardown).unwrap();

        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(tmp.path()));
        assert_eq!(teardown.pending(), 2);
    }

    #[test]
    fn test_teardown_removes_empty_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let volumes = SharedVolumes::new(tmp.path());
        let teardown = TeardownRegistry::new();
        let dir = volumes.dir_for("empty", &teardown).unwrap();

        let report = teardown.run();

        assert!(report.is_clean());
        assert!(!dir.exists());
    }

    #[test]
    fn test_teardown_keeps_non_empty_dir_without_failing() {
        let tmp = tempfile::tempdir().unwrap();
        let volumes = SharedVolumes::new(tmp.path());
        let teardown = TeardownRegistry::new();
        let dir = volumes.dir_for("busy", &teardown).unwrap();
        std::fs::write(dir.join("wallet.dat"), b"w").unwrap();

        let report = teardown.run();

        assert!(report.is_clean());
        assert!(dir.join("wallet.dat").exists());
    }

    #[test]
    fn test_path_in_container() {
        assert_eq!(path_in_container("wallet.dat"), "/shared/wallet.dat");
        assert_eq!(path_in_container("/x"), "/shared/x");
    }
}
