// src/pipeline/sink.rs

use std::path::PathBuf;

use tracing::debug;

use crate::errors::AssetdagError;
use crate::pipeline::record::FileRecord;
use crate::pipeline::stage::{PipelineContext, Stage, StageFuture};
use crate::reload::ReloadEvent;

/// Terminal stage: writes every record under `dest`.
///
/// Records are passed through (with `dest_root` set) so callers can count
/// and report writes.
#[derive(Debug, Clone)]
pub struct DestSink {
    dest: PathBuf,
    /// Emit a live-reload notification per written file.
    reload: bool,
}

impl DestSink {
    pub fn new(dest: impl Into<PathBuf>, reload: bool) -> Self {
        Self {
            dest: dest.into(),
            reload,
        }
    }

    pub fn dest(&self) -> &PathBuf {
        &self.dest
    }
}

impl Stage for DestSink {
    fn name(&self) -> &str {
        "dest"
    }

    fn apply<'a>(&'a self, ctx: &'a PipelineContext, records: Vec<FileRecord>) -> StageFuture<'a> {
        Box::pin(async move {
            let mut written = Vec::with_capacity(records.len());
            for mut record in records {
                let rel_target = record.dest_path(&self.dest);
                let target = ctx.abs(&rel_target);
                ctx.fs
                    .write(&target, &record.contents)
                    .map_err(|e| AssetdagError::io(&target, e))?;
                debug!(path = ?rel_target, bytes = record.contents.len(), "wrote file");

                if self.reload {
                    if let Some(hub) = &ctx.reload {
                        hub.notify(ReloadEvent::Changed(rel_target));
                    }
                }

                record.dest_root = Some(self.dest.clone());
                written.push(record);
            }
            Ok(written)
        })
    }
}
