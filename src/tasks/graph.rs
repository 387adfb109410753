// src/tasks/graph.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::ConfigFile;
use crate::config::TaskConfig;
use crate::errors::{AssetdagError, Result};
use crate::pipeline::Pipeline;
use crate::tasks::clean::CleanTask;
use crate::types::TaskName;
use crate::watch::WatchSpec;

/// A named unit of work.
#[derive(Debug, Clone)]
pub enum TaskDef {
    Pipeline(Arc<Pipeline>),
    Clean(CleanTask),
    /// Children run one after another; the first failure stops the rest.
    Sequence(Vec<TaskName>),
    /// Children run concurrently; every child runs to completion.
    Parallel(Vec<TaskName>),
    Watch(Arc<WatchSpec>),
}

impl TaskDef {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskDef::Pipeline(_) => "pipeline",
            TaskDef::Clean(_) => "clean",
            TaskDef::Sequence(_) => "sequence",
            TaskDef::Parallel(_) => "parallel",
            TaskDef::Watch(_) => "watch",
        }
    }

    /// Tasks this one may start, in declaration order.
    pub fn children(&self) -> Vec<&str> {
        match self {
            TaskDef::Sequence(c) | TaskDef::Parallel(c) => c.iter().map(String::as_str).collect(),
            TaskDef::Watch(spec) => spec.bound_tasks().collect(),
            TaskDef::Pipeline(_) | TaskDef::Clean(_) => Vec::new(),
        }
    }
}

/// Acyclic registry of named tasks.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: BTreeMap<TaskName, TaskDef>,
}

impl TaskGraph {
    pub fn builder() -> TaskGraphBuilder {
        TaskGraphBuilder::default()
    }

    /// Build the graph from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut builder = TaskGraph::builder();

        for (name, p) in cfg.pipelines().iter() {
            builder = builder.pipeline(name, Pipeline::from_config(name, p)?);
        }
        for (name, c) in cfg.cleans().iter() {
            builder = builder.clean(name, &c.path);
        }
        for (name, t) in cfg.tasks().iter() {
            builder = match t {
                TaskConfig::Sequence(children) => builder.sequence(name, children),
                TaskConfig::Parallel(children) => builder.parallel(name, children),
            };
        }
        for (name, w) in cfg.watches().iter() {
            builder = builder.watch(name, WatchSpec::from_config(w)?);
        }

        builder.build()
    }

    pub fn get(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    /// True if running `name` can end up running a watch task.
    pub fn reaches_watch(&self, name: &str) -> bool {
        match self.tasks.get(name) {
            Some(TaskDef::Watch(_)) => true,
            Some(def) => def.children().into_iter().any(|c| self.reaches_watch(c)),
            None => false,
        }
    }
}

/// Programmatic construction of a [`TaskGraph`].
///
/// `build` checks that every reference resolves and that there are no
/// cycles, so graphs assembled in code get the same guarantees as ones
/// loaded from config.
#[derive(Debug, Default)]
pub struct TaskGraphBuilder {
    tasks: BTreeMap<TaskName, TaskDef>,
    duplicate: Option<TaskName>,
}

impl TaskGraphBuilder {
    fn insert(mut self, name: &str, def: TaskDef) -> Self {
        if self.tasks.insert(name.to_string(), def).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(name.to_string());
        }
        self
    }

    pub fn pipeline(self, name: &str, pipeline: Pipeline) -> Self {
        self.insert(name, TaskDef::Pipeline(Arc::new(pipeline)))
    }

    pub fn clean(self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.insert(name, TaskDef::Clean(CleanTask::new(path)))
    }

    pub fn sequence<S: AsRef<str>>(self, name: &str, children: &[S]) -> Self {
        let children = children.iter().map(|c| c.as_ref().to_string()).collect();
        self.insert(name, TaskDef::Sequence(children))
    }

    pub fn parallel<S: AsRef<str>>(self, name: &str, children: &[S]) -> Self {
        let children = children.iter().map(|c| c.as_ref().to_string()).collect();
        self.insert(name, TaskDef::Parallel(children))
    }

    pub fn watch(self, name: &str, spec: WatchSpec) -> Self {
        self.insert(name, TaskDef::Watch(Arc::new(spec)))
    }

    pub fn build(self) -> Result<TaskGraph> {
        if let Some(name) = self.duplicate {
            return Err(AssetdagError::Config(format!(
                "task '{}' is defined more than once",
                name
            )));
        }

        for (name, def) in self.tasks.iter() {
            for child in def.children() {
                if !self.tasks.contains_key(child) {
                    return Err(AssetdagError::TaskNotFound(format!(
                        "'{}' (referenced by '{}')",
                        child, name
                    )));
                }
            }
        }

        let edges: Vec<(&str, &str)> = self
            .tasks
            .iter()
            .flat_map(|(name, def)| {
                def.children()
                    .into_iter()
                    .map(move |child| (name.as_str(), child))
            })
            .collect();
        if let Some(node) = find_cycle(self.tasks.keys().map(String::as_str), edges) {
            return Err(AssetdagError::DagCycle(format!(
                "cycle detected in task graph involving task '{}'",
                node
            )));
        }

        Ok(TaskGraph { tasks: self.tasks })
    }
}

/// Return a node on a cycle, if the graph has one.
///
/// Edge direction: parent -> child.
pub(crate) fn find_cycle<'a>(
    nodes: impl IntoIterator<Item = &'a str>,
    edges: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Option<&'a str> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for node in nodes {
        graph.add_node(node);
    }
    for (from, to) in edges {
        graph.add_edge(from, to, ());
    }

    // A topological sort will fail if there is a cycle.
    toposort(&graph, None).err().map(|cycle| cycle.node_id())
}
