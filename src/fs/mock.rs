// src/fs/mock.rs

use super::FileSystem;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { contents: Vec<u8>, modified: SystemTime },
    Dir(Vec<String>), // List of child names
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    /// Logical clock; every mutation advances it by one second.
    clock: u64,
    writes: usize,
}

/// In-memory filesystem with a deterministic clock.
///
/// Modification times come from a logical clock rather than the wall clock,
/// so freshness comparisons in tests never depend on timestamp resolution.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut state = MockState::default();
        // Ensure root exists
        state
            .entries
            .insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create or replace a file, stamping it with the next clock tick.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        insert_file(&mut state, path.as_ref(), content.into());
    }

    /// Bump a file's modification time without changing its contents.
    pub fn touch(&self, path: impl AsRef<Path>) {
        let mut state = self.lock();
        let now = tick(&mut state);
        if let Some(MockEntry::File { modified, .. }) = state.entries.get_mut(path.as_ref()) {
            *modified = now;
        }
    }

    /// Number of `write` calls performed through the [`FileSystem`] trait.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().entries.get(path.as_ref()) {
            Some(MockEntry::File { contents, .. }) => Some(contents.clone()),
            _ => None,
        }
    }
}

fn tick(state: &mut MockState) -> SystemTime {
    state.clock += 1;
    SystemTime::UNIX_EPOCH + Duration::from_secs(state.clock)
}

fn parent_of(path: &Path) -> Option<&Path> {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Some(Path::new(".")),
        other => other,
    }
}

fn insert_file(state: &mut MockState, path: &Path, contents: Vec<u8>) {
    let modified = tick(state);
    state
        .entries
        .insert(path.to_path_buf(), MockEntry::File { contents, modified });
    link_into_parent(state, path);
}

/// Ensure parent directories exist implicitly and list `path` among the
/// parent's children.
fn link_into_parent(state: &mut MockState, path: &Path) {
    let Some(parent) = parent_of(path) else {
        return;
    };
    if parent == path {
        return;
    }
    if !state.entries.contains_key(parent) {
        state
            .entries
            .insert(parent.to_path_buf(), MockEntry::Dir(Vec::new()));
        link_into_parent(state, parent);
    }
    if let (Some(MockEntry::Dir(children)), Some(name)) = (
        state.entries.get_mut(parent),
        path.file_name().and_then(|n| n.to_str()),
    ) {
        if !children.iter().any(|c| c == name) {
            children.push(name.to_string());
        }
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("not found: {:?}", path))
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.lock().entries.get(path) {
            Some(MockEntry::File { contents, .. }) => Ok(contents.clone()),
            Some(MockEntry::Dir(_)) => Err(io::Error::other(format!(
                "is a directory: {:?}",
                path
            ))),
            None => Err(not_found(path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        state.writes += 1;
        insert_file(&mut state, path, contents.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::Dir(_)))
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        match self.lock().entries.get(path) {
            Some(MockEntry::File { modified, .. }) => Some(*modified),
            _ => None,
        }
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::Dir(_)) => {}
            Some(MockEntry::File { .. }) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("not a directory: {:?}", path),
                ));
            }
            None => return Err(not_found(path)),
        }
        state.entries.retain(|p, _| !p.starts_with(path));

        if let (Some(parent), Some(name)) = (
            parent_of(path).map(Path::to_path_buf),
            path.file_name().and_then(|n| n.to_str()).map(str::to_string),
        ) {
            if let Some(MockEntry::Dir(children)) = state.entries.get_mut(&parent) {
                children.retain(|c| *c != name);
            }
        }
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        match self.lock().entries.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(not_found(path)),
        }
    }
}
