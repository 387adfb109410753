// src/pipeline/freshness.rs

//! Timestamp-based skip filter for incremental builds.

use std::path::PathBuf;
use std::time::SystemTime;

use tracing::debug;

use crate::pipeline::record::FileRecord;
use crate::pipeline::stage::{PipelineContext, Stage, StageFuture};

/// Drops records whose destination counterpart is at least as new as the
/// source.
///
/// Only modification times are compared. Reprocessing an unchanged file is
/// acceptable; skipping a changed one is not, so every unknown timestamp
/// lets the record through.
#[derive(Debug, Clone)]
pub struct NewerFilter {
    /// Project-relative directory the outputs end up in.
    dest: PathBuf,
    /// Extension the output will carry, if the pipeline changes it.
    extension: Option<String>,
}

impl NewerFilter {
    pub fn new(dest: impl Into<PathBuf>, extension: Option<String>) -> Self {
        Self {
            dest: dest.into(),
            extension,
        }
    }

    fn target_for(&self, ctx: &PipelineContext, record: &FileRecord) -> PathBuf {
        let relative = match &self.extension {
            Some(ext) => record.relative.with_extension(ext),
            None => record.relative.clone(),
        };
        ctx.abs(self.dest.join(relative))
    }
}

/// True if a source with mtime `source` must be rebuilt over a destination
/// with mtime `dest`.
pub fn is_stale(source: Option<SystemTime>, dest: Option<SystemTime>) -> bool {
    match (source, dest) {
        (Some(src), Some(dst)) => src > dst,
        _ => true,
    }
}

impl Stage for NewerFilter {
    fn name(&self) -> &str {
        "newer"
    }

    fn apply<'a>(&'a self, ctx: &'a PipelineContext, records: Vec<FileRecord>) -> StageFuture<'a> {
        Box::pin(async move {
            let kept = records
                .into_iter()
                .filter(|record| {
                    let target = self.target_for(ctx, record);
                    let stale = is_stale(record.modified, ctx.fs.modified(&target));
                    if !stale {
                        debug!(
                            source = ?record.source_path(),
                            dest = ?target,
                            "destination up to date; skipping"
                        );
                    }
                    stale
                })
                .collect();
            Ok(kept)
        })
    }
}
