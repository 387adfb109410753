// src/watch/coordinator.rs

//! Async shell around [`WatchCore`].
//!
//! The coordinator reads changed paths from a [`Subscription`], turns them
//! into [`WatchEvent`]s, and carries out the resulting commands: spawning
//! task runs on the Tokio runtime and publishing reload events. A failed run
//! is logged and the coordinator keeps watching.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::reload::{ReloadEvent, ReloadHub};
use crate::types::TaskName;
use crate::watch::core::{WatchCommand, WatchCore, WatchEvent};
use crate::watch::hash::ContentHashes;
use crate::watch::patterns::WatchSpec;
use crate::watch::watcher::Subscription;

pub type TaskFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Starts named tasks on behalf of a watch task.
pub trait TaskExecutor: Send + Sync {
    fn execute(&self, task: &str) -> TaskFuture;
}

type Completion = (TaskName, Result<()>);

pub struct WatchCoordinator {
    name: String,
    root: PathBuf,
    canonical_root: Option<PathBuf>,
    fs: Arc<dyn FileSystem>,
    spec: Arc<WatchSpec>,
    core: WatchCore,
    hashes: ContentHashes,
    executor: Arc<dyn TaskExecutor>,
    reload: Option<ReloadHub>,
}

impl fmt::Debug for WatchCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchCoordinator")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl WatchCoordinator {
    pub fn new(
        name: impl Into<String>,
        spec: Arc<WatchSpec>,
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        let root = root.into();
        Self {
            name: name.into(),
            canonical_root: root.canonicalize().ok(),
            root,
            fs,
            core: WatchCore::new(&spec),
            spec,
            hashes: ContentHashes::new(),
            executor,
            reload: None,
        }
    }

    pub fn with_reload(mut self, hub: Option<ReloadHub>) -> Self {
        self.reload = hub;
        self
    }

    /// Watch until the event stream ends or `shutdown` turns true.
    ///
    /// Runs already in flight are awaited before returning; pending re-runs
    /// are dropped.
    pub async fn run(
        mut self,
        mut events: Subscription,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        self.prime_hashes();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();

        info!(
            watch = %self.name,
            bindings = self.spec.bindings().len(),
            "watching for changes"
        );

        if *shutdown.borrow() {
            return Ok(());
        }

        loop {
            tokio::select! {
                maybe_path = events.recv() => {
                    let Some(path) = maybe_path else {
                        debug!(watch = %self.name, "event stream ended");
                        break;
                    };
                    let commands = self.on_path(&path);
                    self.dispatch(commands, &done_tx);
                }
                Some((task, result)) = done_rx.recv() => {
                    let commands = self.on_done(task, result);
                    self.dispatch(commands, &done_tx);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(watch = %self.name, "shutdown requested");
                        break;
                    }
                }
            }
        }

        // Let in-flight runs finish.
        drop(done_tx);
        while !self.core.is_idle() {
            match done_rx.recv().await {
                Some((task, result)) => {
                    self.on_done(task, result);
                }
                None => break,
            }
        }

        info!(watch = %self.name, "watch stopped");
        Ok(())
    }

    fn prime_hashes(&mut self) {
        for binding in self.spec.bindings().iter().filter(|b| b.use_hash()) {
            match binding.sources().resolve(self.fs.as_ref(), &self.root) {
                Ok(matches) => {
                    for m in matches {
                        self.hashes.prime(self.fs.as_ref(), &self.root.join(&m.path));
                    }
                }
                Err(err) => debug!(error = %err, "could not prime content hashes"),
            }
        }
    }

    /// Project-relative, forward-slash form of an event path.
    ///
    /// The OS watcher reports paths under the canonical root, which may
    /// differ from the configured one (symlinks, `/private/var` on macOS).
    fn relativize(&self, path: &Path) -> Option<String> {
        let rel = path
            .strip_prefix(&self.root)
            .ok()
            .or_else(|| {
                self.canonical_root
                    .as_deref()
                    .and_then(|root| path.strip_prefix(root).ok())
            })?;
        Some(rel.to_string_lossy().replace('\\', "/"))
    }

    fn on_path(&mut self, path: &Path) -> Vec<WatchCommand> {
        let Some(rel) = self.relativize(path) else {
            debug!(path = ?path, "ignoring change outside project root");
            return Vec::new();
        };
        if rel.is_empty() {
            return Vec::new();
        }

        let content_changed = if self.core.needs_hash(&rel) {
            self.hashes.observe(self.fs.as_ref(), &self.root.join(&rel))
        } else {
            true
        };

        debug!(path = %rel, content_changed, "file changed");
        self.core.step(WatchEvent::FileChanged {
            rel,
            content_changed,
        })
    }

    fn on_done(&mut self, task: TaskName, result: Result<()>) -> Vec<WatchCommand> {
        match &result {
            Ok(()) => debug!(watch = %self.name, task = %task, "triggered run finished"),
            Err(err) => warn!(
                watch = %self.name,
                task = %task,
                error = %err,
                "triggered run failed; still watching"
            ),
        }
        self.core.step(WatchEvent::TaskFinished { task })
    }

    fn dispatch(&self, commands: Vec<WatchCommand>, done_tx: &mpsc::UnboundedSender<Completion>) {
        for command in commands {
            match command {
                WatchCommand::RunTask(task) => {
                    info!(watch = %self.name, task = %task, "change detected, running task");
                    let run = self.executor.execute(&task);
                    let done_tx = done_tx.clone();
                    tokio::spawn(async move {
                        let result = run.await;
                        let _ = done_tx.send((task, result));
                    });
                }
                WatchCommand::Reload => match &self.reload {
                    Some(hub) => hub.notify(ReloadEvent::FullReload),
                    None => debug!(watch = %self.name, "reload requested but no reload hub attached"),
                },
            }
        }
    }
}
