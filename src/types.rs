// src/types.rs

/// Name of a task. Pipelines, clean targets, compositions and watch tasks
/// share one namespace.
pub type TaskName = String;
