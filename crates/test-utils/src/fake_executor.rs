use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetdag::errors::AssetdagError;
use assetdag::watch::{TaskExecutor, TaskFuture};

/// A fake task executor for driving watch coordinators in tests.
///
/// - records which tasks were started, in order
/// - each run sleeps for `delay` before completing
/// - tasks listed in `failing` complete with an error
/// - tracks how many runs are in flight at once
#[derive(Clone, Default)]
pub struct FakeExecutor {
    executed: Arc<Mutex<Vec<String>>>,
    completed: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    failing: Arc<HashSet<String>>,
    delay: Duration,
}

impl FakeExecutor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing(mut self, tasks: &[&str]) -> Self {
        self.failing = Arc::new(tasks.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl TaskExecutor for FakeExecutor {
    fn execute(&self, task: &str) -> TaskFuture {
        let this = self.clone();
        let task = task.to_string();

        Box::pin(async move {
            this.executed.lock().unwrap().push(task.clone());
            let now = this.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            this.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(this.delay).await;

            this.in_flight.fetch_sub(1, Ordering::SeqCst);
            this.completed.fetch_add(1, Ordering::SeqCst);

            if this.failing.contains(&task) {
                Err(AssetdagError::Config(format!("fake failure in '{task}'")))
            } else {
                Ok(())
            }
        })
    }
}
