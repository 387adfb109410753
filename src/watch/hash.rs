// src/watch/hash.rs

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Compute the hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> io::Result<String> {
    let contents = fs.read(path)?;
    let mut hasher = Hasher::new();
    hasher.update(&contents);
    Ok(hasher.finalize().to_hex().to_string())
}

/// Last seen content hash per file, kept in memory for the lifetime of a
/// watch task.
#[derive(Debug, Default)]
pub struct ContentHashes {
    map: HashMap<PathBuf, String>,
}

impl ContentHashes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current contents of `path` without reporting a change.
    pub fn prime(&mut self, fs: &dyn FileSystem, path: &Path) {
        if let Ok(hash) = compute_file_hash(fs, path) {
            self.map.insert(path.to_path_buf(), hash);
        }
    }

    /// Hash `path` and report whether it differs from the last observation.
    ///
    /// A file that cannot be read (e.g. it was deleted) always counts as
    /// changed and is forgotten.
    pub fn observe(&mut self, fs: &dyn FileSystem, path: &Path) -> bool {
        match compute_file_hash(fs, path) {
            Ok(hash) => {
                let changed = self.map.get(path) != Some(&hash);
                if changed {
                    self.map.insert(path.to_path_buf(), hash);
                } else {
                    debug!(path = ?path, "content unchanged");
                }
                changed
            }
            Err(err) => {
                debug!(path = ?path, error = %err, "could not hash file, treating as changed");
                self.map.remove(path);
                true
            }
        }
    }
}
