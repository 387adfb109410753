// src/tasks/clean.rs

use std::io;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::errors::{AssetdagError, Result};
use crate::pipeline::PipelineContext;

/// Removes an output directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanTask {
    path: PathBuf,
}

impl CleanTask {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Delete the directory. A directory that is already gone is success.
    pub fn run(&self, ctx: &PipelineContext) -> Result<()> {
        let abs = ctx.abs(&self.path);
        match ctx.fs.remove_dir_all(&abs) {
            Ok(()) => {
                info!(path = ?self.path, "cleaned");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "nothing to clean");
                Ok(())
            }
            Err(source) => Err(AssetdagError::Clean { path: abs, source }),
        }
    }
}
