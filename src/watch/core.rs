// src/watch/core.rs

//! Pure watch state machine.
//!
//! [`WatchCore`] consumes [`WatchEvent`]s and returns [`WatchCommand`]s for
//! the async shell ([`crate::watch::WatchCoordinator`]) to carry out. It owns
//! no channels and performs no IO, so every coalescing rule is unit tested
//! here without Tokio.
//!
//! Per bound task the state is one of:
//! - idle (not in the map)
//! - running
//! - running with a re-run pending
//!
//! Changes that arrive while a task runs collapse into a single pending
//! re-run, started once the current run finishes.

use std::collections::HashMap;

use crate::types::TaskName;
use crate::watch::patterns::{WatchAction, WatchBinding, WatchSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A file changed. `rel` is relative to the project root with forward
    /// slashes. `content_changed` is only consulted by hashing bindings.
    FileChanged { rel: String, content_changed: bool },
    /// A run started by a previous [`WatchCommand::RunTask`] completed,
    /// successfully or not.
    TaskFinished { task: TaskName },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    RunTask(TaskName),
    Reload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    RunningWithPending,
}

#[derive(Debug)]
pub struct WatchCore {
    bindings: Vec<WatchBinding>,
    state: HashMap<TaskName, RunState>,
}

impl WatchCore {
    pub fn new(spec: &WatchSpec) -> Self {
        Self {
            bindings: spec.bindings().to_vec(),
            state: HashMap::new(),
        }
    }

    /// True when no bound task is running.
    pub fn is_idle(&self) -> bool {
        self.state.is_empty()
    }

    pub fn is_running(&self, task: &str) -> bool {
        self.state.contains_key(task)
    }

    /// Whether handling a change to `rel` needs its content hash.
    pub fn needs_hash(&self, rel: &str) -> bool {
        self.bindings
            .iter()
            .any(|b| b.use_hash() && b.matches(rel))
    }

    pub fn step(&mut self, event: WatchEvent) -> Vec<WatchCommand> {
        match event {
            WatchEvent::FileChanged {
                rel,
                content_changed,
            } => self.on_file_changed(&rel, content_changed),
            WatchEvent::TaskFinished { task } => self.on_task_finished(&task),
        }
    }

    fn on_file_changed(&mut self, rel: &str, content_changed: bool) -> Vec<WatchCommand> {
        let mut tasks: Vec<&TaskName> = Vec::new();
        let mut reload = false;

        for binding in self.bindings.iter() {
            if !binding.matches(rel) || (binding.use_hash() && !content_changed) {
                continue;
            }
            match binding.action() {
                WatchAction::RunTask(task) => {
                    if !tasks.contains(&task) {
                        tasks.push(task);
                    }
                }
                WatchAction::Reload => reload = true,
            }
        }

        let tasks: Vec<TaskName> = tasks.into_iter().cloned().collect();
        let mut commands = Vec::new();
        for task in tasks {
            if let Some(cmd) = self.trigger(task) {
                commands.push(cmd);
            }
        }
        if reload {
            commands.push(WatchCommand::Reload);
        }
        commands
    }

    fn trigger(&mut self, task: TaskName) -> Option<WatchCommand> {
        match self.state.get_mut(&task) {
            None => {
                self.state.insert(task.clone(), RunState::Running);
                Some(WatchCommand::RunTask(task))
            }
            Some(state) => {
                *state = RunState::RunningWithPending;
                None
            }
        }
    }

    fn on_task_finished(&mut self, task: &str) -> Vec<WatchCommand> {
        match self.state.remove(task) {
            Some(RunState::RunningWithPending) => {
                self.state.insert(task.to_string(), RunState::Running);
                vec![WatchCommand::RunTask(task.to_string())]
            }
            Some(RunState::Running) | None => Vec::new(),
        }
    }
}
