// src/tasks/runner.rs

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info};

use crate::errors::{AssetdagError, Result};
use crate::pipeline::PipelineContext;
use crate::tasks::graph::{TaskDef, TaskGraph};
use crate::types::TaskName;
use crate::watch::{
    EventSource, NotifyEventSource, TaskExecutor, TaskFuture, WatchCoordinator, WatchSpec,
};

type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

struct RunnerInner {
    graph: TaskGraph,
    ctx: PipelineContext,
    events: Arc<dyn EventSource>,
    shutdown: watch::Sender<bool>,
}

/// Executes tasks from a [`TaskGraph`].
///
/// Cheap to clone; clones share the graph, the pipeline context and the
/// shutdown signal.
#[derive(Clone)]
pub struct TaskRunner {
    inner: Arc<RunnerInner>,
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("root", &self.inner.ctx.root)
            .finish_non_exhaustive()
    }
}

impl TaskRunner {
    pub fn new(graph: TaskGraph, ctx: PipelineContext) -> Self {
        Self::with_event_source(graph, ctx, Arc::new(NotifyEventSource))
    }

    /// Use `events` instead of the OS watcher for watch tasks.
    pub fn with_event_source(
        graph: TaskGraph,
        ctx: PipelineContext,
        events: Arc<dyn EventSource>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(RunnerInner {
                graph,
                ctx,
                events,
                shutdown,
            }),
        }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.inner.graph
    }

    pub fn context(&self) -> &PipelineContext {
        &self.inner.ctx
    }

    /// Ask every running watch task to stop. Tasks already running finish.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    /// Run `name` and everything it composes.
    ///
    /// Resolves once the task and all of its children have completed.
    pub fn run<'a>(&'a self, name: &'a str) -> RunFuture<'a> {
        Box::pin(async move {
            let def = self
                .inner
                .graph
                .get(name)
                .ok_or_else(|| AssetdagError::TaskNotFound(name.to_string()))?;

            debug!(task = %name, kind = def.kind(), "starting task");
            let started = Instant::now();

            let result = match def {
                TaskDef::Pipeline(pipeline) => pipeline.run(&self.inner.ctx).await.map(|_| ()),
                TaskDef::Clean(clean) => clean.run(&self.inner.ctx),
                TaskDef::Sequence(children) => self.run_sequence(name, children).await,
                TaskDef::Parallel(children) => self.run_parallel(name, children).await,
                TaskDef::Watch(spec) => self.run_watch(name, Arc::clone(spec)).await,
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(()) => info!(task = %name, elapsed_ms, "finished"),
                Err(err) if matches!(def, TaskDef::Pipeline(_) | TaskDef::Clean(_)) => {
                    error!(task = %name, elapsed_ms, error = %err, "failed")
                }
                Err(_) => debug!(task = %name, elapsed_ms, "failed"),
            }
            result
        })
    }

    async fn run_sequence(&self, name: &str, children: &[TaskName]) -> Result<()> {
        for child in children {
            if let Err(err) = self.run(child).await {
                debug!(task = %name, child = %child, "sequence aborted");
                return Err(err);
            }
        }
        Ok(())
    }

    async fn run_parallel(&self, name: &str, children: &[TaskName]) -> Result<()> {
        let mut set = JoinSet::new();
        let mut spawned: HashMap<task::Id, (usize, TaskName)> = HashMap::new();
        for (index, child) in children.iter().enumerate() {
            let runner = self.clone();
            let owned = child.clone();
            let handle = set.spawn(async move { runner.run(&owned).await });
            spawned.insert(handle.id(), (index, child.clone()));
        }

        let mut failures: Vec<(usize, TaskName, AssetdagError)> = Vec::new();
        while let Some(joined) = set.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(join_err) => {
                    let id = join_err.id();
                    let child = spawned.get(&id).map(|(_, c)| c.clone()).unwrap_or_default();
                    (id, Err(AssetdagError::Panicked(child)))
                }
            };
            if let (Err(err), Some((index, child))) = (result, spawned.remove(&id)) {
                failures.push((index, child, err));
            }
        }

        if failures.is_empty() {
            return Ok(());
        }
        failures.sort_by_key(|(index, _, _)| *index);
        Err(AssetdagError::Parallel {
            task: name.to_string(),
            failures: failures
                .into_iter()
                .map(|(_, child, err)| (child, err))
                .collect(),
        })
    }

    async fn run_watch(&self, name: &str, spec: Arc<WatchSpec>) -> Result<()> {
        let ctx = &self.inner.ctx;
        let events = self.inner.events.subscribe(&ctx.root)?;
        let executor: Arc<dyn TaskExecutor> = Arc::new(self.clone());

        WatchCoordinator::new(name, spec, Arc::clone(&ctx.fs), &ctx.root, executor)
            .with_reload(ctx.reload.clone())
            .run(events, self.inner.shutdown.subscribe())
            .await
    }
}

impl TaskExecutor for TaskRunner {
    fn execute(&self, task: &str) -> TaskFuture {
        let runner = self.clone();
        let task = task.to_string();
        Box::pin(async move { runner.run(&task).await })
    }
}
