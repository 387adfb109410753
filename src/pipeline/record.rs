// src/pipeline/record.rs

use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// A file in flight through a pipeline.
///
/// Stages never mutate a record in place; they build new ones with the
/// `with_*` helpers and return them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path below `base`, e.g. `css/style.min.css`.
    pub relative: PathBuf,
    pub contents: Vec<u8>,
    /// Source root the record was matched under (project-relative).
    pub base: PathBuf,
    /// Modification time of the source file(s) this record was built from.
    pub modified: Option<SystemTime>,
    /// Destination root, set once a sink has written the record.
    pub dest_root: Option<PathBuf>,
}

impl FileRecord {
    pub fn new(
        base: impl Into<PathBuf>,
        relative: impl Into<PathBuf>,
        contents: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            relative: relative.into(),
            contents: contents.into(),
            base: base.into(),
            modified: None,
            dest_root: None,
        }
    }

    pub fn with_modified(mut self, modified: Option<SystemTime>) -> Self {
        self.modified = modified;
        self
    }

    pub fn with_contents(&self, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: contents.into(),
            ..self.clone()
        }
    }

    pub fn with_relative(&self, relative: impl Into<PathBuf>) -> Self {
        Self {
            relative: relative.into(),
            ..self.clone()
        }
    }

    pub fn with_extension(&self, extension: &str) -> Self {
        self.with_relative(self.relative.with_extension(extension))
    }

    /// Path segments of `relative`.
    pub fn segments(&self) -> Vec<String> {
        self.relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect()
    }

    /// Project-relative source path (`base/relative`).
    pub fn source_path(&self) -> PathBuf {
        self.base.join(&self.relative)
    }

    /// Where this record lands under `dest_root`.
    pub fn dest_path(&self, dest_root: &Path) -> PathBuf {
        dest_root.join(&self.relative)
    }
}
