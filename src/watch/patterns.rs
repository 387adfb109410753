// src/watch/patterns.rs

use crate::config::model::{BindingConfig, WatchConfig};
use crate::errors::Result;
use crate::pipeline::matcher::{glob_base, SourceSet};
use crate::types::TaskName;

/// What a binding does when one of its patterns matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchAction {
    RunTask(TaskName),
    Reload,
}

/// Compiled patterns plus the action they fire.
///
/// Patterns are relative to the project root and support `!` negation, the
/// same as pipeline sources. A pattern without glob characters also matches
/// everything below it, so `app/images/src` watches a whole directory.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    sources: SourceSet,
    action: WatchAction,
    use_hash: bool,
}

impl WatchBinding {
    pub fn new<S: AsRef<str>>(patterns: &[S], action: WatchAction) -> Result<Self> {
        let mut expanded = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            expanded.push(pattern.to_string());
            let (_, literal) = glob_base(pattern.trim_start_matches('!'));
            if literal {
                expanded.push(format!("{}/**", pattern.trim_end_matches('/')));
            }
        }

        Ok(Self {
            sources: SourceSet::new(&expanded, None)?,
            action,
            use_hash: false,
        })
    }

    /// Only fire when the changed file's contents differ from the last
    /// observed version.
    pub fn with_hash(mut self) -> Self {
        self.use_hash = true;
        self
    }

    pub fn from_config(cfg: &BindingConfig) -> Result<Self> {
        let action = match &cfg.task {
            Some(task) => WatchAction::RunTask(task.clone()),
            None => WatchAction::Reload,
        };
        let binding = Self::new(&cfg.patterns, action)?;
        Ok(if cfg.use_hash { binding.with_hash() } else { binding })
    }

    /// `rel` is a forward-slash path relative to the project root.
    pub fn matches(&self, rel: &str) -> bool {
        self.sources.matches(rel)
    }

    pub fn action(&self) -> &WatchAction {
        &self.action
    }

    pub fn use_hash(&self) -> bool {
        self.use_hash
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }
}

/// The bindings of one watch task, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct WatchSpec {
    bindings: Vec<WatchBinding>,
}

impl WatchSpec {
    pub fn new(bindings: Vec<WatchBinding>) -> Self {
        Self { bindings }
    }

    pub fn from_config(cfg: &WatchConfig) -> Result<Self> {
        let bindings = cfg
            .bind
            .iter()
            .map(WatchBinding::from_config)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { bindings })
    }

    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }

    /// Names of the tasks this watch can start.
    pub fn bound_tasks(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().filter_map(|b| match &b.action {
            WatchAction::RunTask(task) => Some(task.as_str()),
            WatchAction::Reload => None,
        })
    }
}
