// src/pipeline/stage.rs

//! The uniform transform interface every pipeline step implements.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tracing::trace;

use crate::errors::{AssetdagError, Result};
use crate::fs::FileSystem;
use crate::pipeline::matcher::SourceMatch;
use crate::pipeline::record::FileRecord;
use crate::reload::ReloadHub;

pub type StageFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<FileRecord>>> + Send + 'a>>;

/// Shared services handed to every stage of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub fs: Arc<dyn FileSystem>,
    /// Project root; all pipeline paths are relative to it.
    pub root: PathBuf,
    /// Live-reload bridge, present only in dev/watch mode.
    pub reload: Option<ReloadHub>,
}

impl PipelineContext {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
            reload: None,
        }
    }

    pub fn with_reload(mut self, hub: ReloadHub) -> Self {
        self.reload = Some(hub);
        self
    }

    pub fn abs(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    /// Read a matched source file into a record.
    pub fn load(&self, m: &SourceMatch) -> Result<FileRecord> {
        let abs = self.abs(&m.path);
        let contents = self.fs.read(&abs).map_err(|e| AssetdagError::io(&abs, e))?;
        Ok(FileRecord::new(&m.base, &m.relative, contents).with_modified(self.fs.modified(&abs)))
    }
}

/// A single transformation step: records in, records out.
///
/// Stages must not assume any cardinality relation between input and output.
/// Only the sink performs durable writes.
pub trait Stage: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn apply<'a>(&'a self, ctx: &'a PipelineContext, records: Vec<FileRecord>) -> StageFuture<'a>;
}

/// Feed `records` through `stages` in order, stopping at the first error.
pub async fn run_stages(
    stages: &[Box<dyn Stage>],
    ctx: &PipelineContext,
    mut records: Vec<FileRecord>,
) -> Result<Vec<FileRecord>> {
    for stage in stages {
        let before = records.len();
        records = stage.apply(ctx, records).await?;
        trace!(stage = stage.name(), before, after = records.len(), "stage applied");
    }
    Ok(records)
}
