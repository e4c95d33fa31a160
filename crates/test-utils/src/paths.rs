//! Path utilities and temporary grid directory trees.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Returns the workspace root directory.
///
/// This is determined by walking up from the test-utils manifest directory.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// A temporary directory laid out as `<root>/<year>/<file>`.
///
/// Files are created empty; pair with [`crate::MockGridSource`] which
/// serves datasets by file name. The directory is removed on drop.
pub struct GridTree {
    dir: TempDir,
}

impl GridTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Create an empty file under the year subdirectory and return its path.
    pub fn add_file(&self, year: i32, name: &str) -> PathBuf {
        let year_dir = self.dir.path().join(year.to_string());
        fs::create_dir_all(&year_dir).expect("create year dir");
        let path = year_dir.join(name);
        fs::write(&path, b"").expect("create grid file");
        path
    }

    /// Create an empty file directly under the root.
    pub fn add_flat_file(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, b"").expect("create grid file");
        path
    }
}

impl Default for GridTree {
    fn default() -> Self {
        Self::new()
    }
}
