//! Scoped task ownership
//!
//! Every periodic or subscription-driven task an engine starts is held as
//! a [`TaskGuard`], so dropping the owning handle releases the task on
//! every exit path (normal leave, error, component teardown).

use tokio::task::JoinHandle;

/// Abort-on-drop handle to a spawned task
#[derive(Debug)]
pub struct TaskGuard {
    handle: JoinHandle<()>,
}

impl TaskGuard {
    /// Wrap a spawned task
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    /// Whether the task has already finished on its own
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
