// src/watch/mod.rs

//! File watching and change-driven task runs.
//!
//! - [`patterns`] compiles watch bindings (patterns plus an action).
//! - [`core`] is the pure coalescing state machine.
//! - [`coordinator`] is the async shell that runs tasks and publishes
//!   reload events.
//! - [`watcher`] wires up the cross-platform `notify` watcher.
//! - [`hash`] lets bindings ignore saves that leave contents unchanged.
//!
//! This module does not know how tasks are composed; it only turns
//! filesystem changes into task runs through a [`TaskExecutor`].

pub mod coordinator;
pub mod core;
pub mod hash;
pub mod patterns;
pub mod watcher;

pub use coordinator::{TaskExecutor, TaskFuture, WatchCoordinator};
pub use self::core::{WatchCommand, WatchCore, WatchEvent};
pub use hash::ContentHashes;
pub use patterns::{WatchAction, WatchBinding, WatchSpec};
pub use watcher::{
    spawn_watcher, ChannelEventSource, EventSource, NotifyEventSource, Subscription,
    WatcherHandle,
};
