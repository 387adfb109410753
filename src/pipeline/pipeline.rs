// src/pipeline/pipeline.rs

use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::model::PipelineConfig;
use crate::errors::Result;
use crate::pipeline::matcher::{require_matches, SourceSet};
use crate::pipeline::sink::DestSink;
use crate::pipeline::stage::{run_stages, PipelineContext, Stage};
use crate::pipeline::stages::build_stages;

/// What a single pipeline run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Number of source files matched.
    pub matched: usize,
    /// Project-relative paths written by the sink.
    pub written: Vec<PathBuf>,
}

/// Sources, an ordered chain of stages, and a sink.
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    sources: SourceSet,
    stages: Vec<Box<dyn Stage>>,
    sink: DestSink,
    allow_empty: bool,
}

impl Pipeline {
    pub fn new(
        name: impl Into<String>,
        sources: SourceSet,
        stages: Vec<Box<dyn Stage>>,
        sink: DestSink,
    ) -> Self {
        Self {
            name: name.into(),
            sources,
            stages,
            sink,
            allow_empty: true,
        }
    }

    /// Make an empty match a [`crate::errors::AssetdagError::NoMatch`].
    pub fn require_match(mut self) -> Self {
        self.allow_empty = false;
        self
    }

    pub fn from_config(name: &str, cfg: &PipelineConfig) -> Result<Self> {
        let sources = SourceSet::new(&cfg.src, cfg.base.clone())?;
        let stages = build_stages(&cfg.stages)?;
        let pipeline = Self::new(name, sources, stages, DestSink::new(&cfg.dest, cfg.reload));
        Ok(if cfg.allow_empty {
            pipeline
        } else {
            pipeline.require_match()
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    pub fn dest(&self) -> &PathBuf {
        self.sink.dest()
    }

    /// Match, transform and write.
    ///
    /// Resolves once the sink has written every surviving record; the first
    /// error from any stage aborts the run.
    pub async fn run(&self, ctx: &PipelineContext) -> Result<PipelineReport> {
        let matches = self.sources.resolve(ctx.fs.as_ref(), &ctx.root)?;
        if !self.allow_empty {
            require_matches(&self.name, &self.sources, &matches)?;
        }
        debug!(pipeline = %self.name, matched = matches.len(), "sources resolved");

        let records = matches
            .iter()
            .map(|m| ctx.load(m))
            .collect::<Result<Vec<_>>>()?;

        let transformed = run_stages(&self.stages, ctx, records).await?;
        let written = self.sink.apply(ctx, transformed).await?;

        let report = PipelineReport {
            matched: matches.len(),
            written: written
                .iter()
                .map(|r| r.dest_path(self.sink.dest()))
                .collect(),
        };

        info!(
            pipeline = %self.name,
            matched = report.matched,
            written = report.written.len(),
            "pipeline finished"
        );
        Ok(report)
    }
}
