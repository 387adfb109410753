// src/reload.rs

//! Live-reload notification bridge.
//!
//! A [`ReloadHub`] is created once per process and handed explicitly to the
//! pipelines and watch coordinator that need to notify clients. The HTTP side
//! (browser connections) lives outside this crate; it subscribes to the hub.

use std::path::PathBuf;

use tokio::sync::broadcast;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadEvent {
    /// An asset was rewritten; clients may hot-swap it.
    Changed(PathBuf),
    /// Clients should reload the whole page.
    FullReload,
}

#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadEvent>,
}

impl ReloadHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no connected clients is not an error.
    pub fn notify(&self, event: ReloadEvent) {
        match self.tx.send(event) {
            Ok(n) => debug!(receivers = n, "reload event published"),
            Err(broadcast::error::SendError(event)) => {
                debug!(?event, "reload event dropped (no clients)")
            }
        }
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Spawn a client that logs every reload event.
///
/// Stands in for a browser bridge when running from the CLI.
pub fn spawn_logging_client(hub: &ReloadHub) -> tokio::task::JoinHandle<()> {
    let mut rx = hub.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ReloadEvent::Changed(path)) => info!(path = ?path, "live reload: asset changed"),
                Ok(ReloadEvent::FullReload) => info!("live reload: full page reload"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "reload client lagged")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
