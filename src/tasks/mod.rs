// src/tasks/mod.rs

//! Named tasks and their composition.
//!
//! A [`TaskGraph`] maps names to [`TaskDef`]s: pipelines, clean targets,
//! `sequence` / `parallel` compositions and watch tasks. The [`TaskRunner`]
//! executes them on the Tokio runtime.

pub mod clean;
pub mod graph;
pub mod runner;

pub use clean::CleanTask;
pub use graph::{TaskDef, TaskGraph, TaskGraphBuilder};
pub use runner::TaskRunner;
