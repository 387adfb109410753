// src/errors.rs

//! Crate-wide error type.
//!
//! Pipelines, stages and task composition all report through
//! [`AssetdagError`]. The binary boundary (`main.rs`, [`crate::run`]) wraps
//! these in `anyhow` for reporting.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetdagError {
    #[error("pipeline '{pipeline}' matched no files for patterns {patterns:?}")]
    NoMatch {
        pipeline: String,
        patterns: Vec<String>,
    },

    #[error("stage '{stage}' rejected {path:?}: {message}")]
    Transform {
        stage: String,
        path: PathBuf,
        message: String,
    },

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to clean {path:?}: {source}")]
    Clean {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("task '{0}' panicked")]
    Panicked(String),

    #[error("parallel task '{task}' failed: {}", summarize(.failures))]
    Parallel {
        task: String,
        failures: Vec<(String, AssetdagError)>,
    },
}

impl AssetdagError {
    /// Shorthand for wrapping an IO error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AssetdagError::Io {
            path: path.into(),
            source,
        }
    }
}

fn summarize(failures: &[(String, AssetdagError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("[{name}] {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, AssetdagError>;
