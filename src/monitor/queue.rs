//! Unbounded FIFO of paths awaiting processing.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Inner {
    items: Mutex<VecDeque<PathBuf>>,
    ready: Condvar,
}

/// Thread-safe work queue shared by the observer, the worker and manual
/// submissions. Cloning yields another handle to the same queue.
#[derive(Clone, Default)]
pub struct WorkQueue {
    inner: Arc<Inner>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a path and wake one waiting consumer.
    pub fn push(&self, path: PathBuf) {
        self.inner.items.lock().push_back(path);
        self.inner.ready.notify_one();
    }

    /// Put a path back at the head of the queue.
    pub fn requeue(&self, path: PathBuf) {
        self.inner.items.lock().push_front(path);
        self.inner.ready.notify_one();
    }

    /// Remove the oldest path, waiting up to `timeout` for one to arrive.
    pub fn pop(&self, timeout: Duration) -> Option<PathBuf> {
        let deadline = Instant::now() + timeout;
        let mut items = self.inner.items.lock();
        loop {
            if let Some(path) = items.pop_front() {
                return Some(path);
            }
            if self.inner.ready.wait_until(&mut items, deadline).timed_out() {
                return items.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.lock().is_empty()
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue").field("len", &self.len()).finish()
    }
}
