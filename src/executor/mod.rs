//! Execution contexts that run handlers off the publishing thread.
//!
//! - [`WorkerPool`]: background threads for `BackgroundThread` deliveries
//! - [`MainLoop`]: a serial queue pumped by one host thread, for `MainThread`
//!   deliveries
//!
//! Hosts with their own event loop or thread pool implement [`Executor`]
//! directly, or wrap a plain function with [`from_fn`].

mod main_loop;
mod pool;

pub use main_loop::{MainLoop, MainLoopExecutor};
pub use pool::{WorkerPool, MAX_WORKERS};

use crate::error::Result;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

/// A unit of work submitted to an execution context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Somewhere tasks can be sent to run.
///
/// An executor used as the main context must run tasks one at a time, in
/// submission order.
pub trait Executor: Send + Sync {
    /// Submit a task. Must not wait for it to run.
    fn execute(&self, task: Task) -> Result<()>;

    /// Whether the calling thread is this context's own thread.
    fn is_current(&self) -> bool {
        false
    }
}

/// An [`Executor`] backed by a plain function.
pub struct FnExecutor<F> {
    submit: F,
}

/// Adapt a function that accepts tasks into an [`Executor`].
pub fn from_fn<F>(submit: F) -> FnExecutor<F>
where
    F: Fn(Task) -> Result<()> + Send + Sync,
{
    FnExecutor { submit }
}

impl<F> Executor for FnExecutor<F>
where
    F: Fn(Task) -> Result<()> + Send + Sync,
{
    fn execute(&self, task: Task) -> Result<()> {
        (self.submit)(task)
    }
}

/// Run a task, logging instead of unwinding if it panics.
pub(crate) fn run_task(task: Task, context: &'static str) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        error!(
            context,
            panic = %panic_message(payload.as_ref()),
            "Task panicked"
        );
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
