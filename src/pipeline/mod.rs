// src/pipeline/mod.rs

//! Asset pipelines: match sources, push them through stages, write results.
//!
//! - [`matcher`] resolves glob patterns into source files.
//! - [`stage`] defines the [`Stage`] interface and [`PipelineContext`].
//! - [`stages`] holds the built-in stages (`concat`, `rename`, `command`,
//!   `fanout`, `add`, `filter`).
//! - [`freshness`] is the timestamp-based `newer` filter.
//! - [`sink`] is the terminal writer.

pub mod freshness;
pub mod matcher;
#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod stage;
pub mod stages;

pub use freshness::NewerFilter;
pub use matcher::{SourceMatch, SourceSet};
pub use pipeline::{Pipeline, PipelineReport};
pub use record::FileRecord;
pub use sink::DestSink;
pub use stage::{PipelineContext, Stage, StageFuture};
