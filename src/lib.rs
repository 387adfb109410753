// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod reload;
pub mod tasks;
pub mod types;
pub mod watch;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::errors::AssetdagError;
use crate::fs::RealFileSystem;
use crate::pipeline::PipelineContext;
use crate::reload::{spawn_logging_client, ReloadHub};
use crate::tasks::{TaskDef, TaskGraph, TaskRunner};
use crate::watch::WatchAction;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the task graph and runner
/// - the reload hub (only when a watch task can run)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let graph = TaskGraph::from_config(&cfg)?;

    if args.list {
        print!("{}", render_list(&graph));
        return Ok(());
    }

    let task = args
        .task
        .clone()
        .unwrap_or_else(|| cfg.config.default_task.clone());
    if !graph.contains(&task) {
        return Err(AssetdagError::TaskNotFound(task).into());
    }

    if args.dry_run {
        print!("{}", render_dry_run(&graph, &task));
        debug!("dry-run complete (no execution)");
        return Ok(());
    }

    let root = config_root_dir(&config_path);
    info!(task = %task, root = ?root, "running");

    let mut ctx = PipelineContext::new(Arc::new(RealFileSystem), root);
    if graph.reaches_watch(&task) {
        let hub = ReloadHub::default();
        let _ = spawn_logging_client(&hub);
        ctx = ctx.with_reload(hub);
    }

    let runner = TaskRunner::new(graph, ctx);

    // First Ctrl-C stops watch tasks gracefully; a second one aborts.
    {
        let runner = runner.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received, stopping watchers");
            runner.shutdown();

            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("assetdag: interrupted");
                std::process::exit(130);
            }
        });
    }

    runner.run(&task).await?;
    Ok(())
}

/// Figure out the project root.
///
/// - If the config path has a non-empty parent (e.g. "site/Assetdag.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Assetdag.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// One line per task: `name  kind`.
pub fn render_list(graph: &TaskGraph) -> String {
    let width = graph.names().map(str::len).max().unwrap_or(0);
    let mut out = String::new();
    for name in graph.names() {
        if let Some(def) = graph.get(name) {
            let _ = writeln!(out, "{name:<width$}  {}", def.kind());
        }
    }
    out
}

/// Indented tree of everything `task` would run.
pub fn render_dry_run(graph: &TaskGraph, task: &str) -> String {
    let mut out = String::from("assetdag dry-run\n");
    render_node(graph, task, 1, &mut out);
    out
}

fn render_node(graph: &TaskGraph, name: &str, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let Some(def) = graph.get(name) else {
        return;
    };

    match def {
        TaskDef::Pipeline(p) => {
            let _ = writeln!(
                out,
                "{indent}{name} (pipeline): {:?} -> {}",
                p.sources().patterns(),
                p.dest().display()
            );
        }
        TaskDef::Clean(c) => {
            let _ = writeln!(out, "{indent}{name} (clean): {}", c.path().display());
        }
        TaskDef::Sequence(children) | TaskDef::Parallel(children) => {
            let _ = writeln!(out, "{indent}{name} ({})", def.kind());
            for child in children {
                render_node(graph, child, depth + 1, out);
            }
        }
        TaskDef::Watch(spec) => {
            let _ = writeln!(out, "{indent}{name} (watch)");
            for binding in spec.bindings() {
                let action = match binding.action() {
                    WatchAction::RunTask(task) => format!("run {task}"),
                    WatchAction::Reload => "reload".to_string(),
                };
                let hash = if binding.use_hash() { " [hash]" } else { "" };
                let _ = writeln!(
                    out,
                    "{indent}  on {:?} -> {action}{hash}",
                    binding.sources().patterns()
                );
            }
        }
    }
}
