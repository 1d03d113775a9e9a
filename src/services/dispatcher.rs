//! Hand-off of work to the thread that owns the UI.

/// A unit of work to run on the UI thread.
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Posts tasks to the owning thread's queue.
///
/// Tasks run in the order they were posted. When the queue is gone the task
/// is dropped without running, which also drops everything it captured.
pub trait UiDispatcher: Send + Sync {
    fn post(&self, task: UiTask);
}
