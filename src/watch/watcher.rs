// src/watch/watcher.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::{AssetdagError, Result};

/// Capacity of the path channel handed to the watch coordinator.
const EVENT_BUFFER: usize = 256;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// A live stream of changed paths. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<PathBuf>,
    _handle: Option<WatcherHandle>,
}

impl Subscription {
    /// Wrap a plain receiver, e.g. one fed by a test.
    pub fn from_receiver(events: mpsc::Receiver<PathBuf>) -> Self {
        Self {
            events,
            _handle: None,
        }
    }

    pub async fn recv(&mut self) -> Option<PathBuf> {
        self.events.recv().await
    }
}

/// Where watch tasks get their change events from.
pub trait EventSource: Send + Sync + fmt::Debug {
    fn subscribe(&self, root: &Path) -> Result<Subscription>;
}

/// Recursive OS-level watcher on the project root.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyEventSource;

impl EventSource for NotifyEventSource {
    fn subscribe(&self, root: &Path) -> Result<Subscription> {
        let (handle, events) = spawn_watcher(root)?;
        Ok(Subscription {
            events,
            _handle: Some(handle),
        })
    }
}

/// Hands out one pre-built receiver. Used to drive watch tasks from tests.
#[derive(Debug)]
pub struct ChannelEventSource {
    rx: Mutex<Option<mpsc::Receiver<PathBuf>>>,
}

impl ChannelEventSource {
    pub fn new() -> (mpsc::Sender<PathBuf>, Self) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        (
            tx,
            Self {
                rx: Mutex::new(Some(rx)),
            },
        )
    }
}

impl EventSource for ChannelEventSource {
    fn subscribe(&self, _root: &Path) -> Result<Subscription> {
        let rx = self
            .rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| {
                AssetdagError::Config("channel event source already subscribed".into())
            })?;
        Ok(Subscription::from_receiver(rx))
    }
}

/// Spawn a filesystem watcher that observes `root` recursively and forwards
/// the absolute path of every created, modified or removed file.
pub fn spawn_watcher(root: impl Into<PathBuf>) -> Result<(WatcherHandle, mpsc::Receiver<PathBuf>)> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // We can't log via tracing here easily, so fallback to stderr.
                    eprintln!("assetdag: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("assetdag: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!("file watcher started on {:?}", root);

    let (path_tx, path_rx) = mpsc::channel(EVENT_BUFFER);

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if !is_content_event(&event.kind) {
                continue;
            }
            debug!(?event, "received notify event");
            for path in event.paths {
                if path_tx.send(path).await.is_err() {
                    debug!("watch subscriber gone, stopping forwarder");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok((WatcherHandle { _inner: watcher }, path_rx))
}

fn is_content_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}
