//! Fixed-size worker pool for background deliveries.

use super::{run_task, Executor, Task};
use crate::error::{HubError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Upper bound on pool size accepted from configuration.
pub const MAX_WORKERS: usize = 1024;

/// Worker threads sharing one unbounded task queue.
///
/// Tasks run in no particular order relative to each other. Dropping the pool
/// closes the queue, lets workers drain what was already submitted, then
/// joins them.
pub struct WorkerPool {
    /// Closed (set to `None`) on shutdown.
    sender: RwLock<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` workers named `{name}-{index}`.
    ///
    /// `size` must be between 1 and [`MAX_WORKERS`] and `name` must not
    /// contain NUL bytes.
    pub fn new(size: usize, name: &str) -> Result<Self> {
        if size == 0 {
            return Err(HubError::InvalidConfig(
                "worker pool needs at least one thread".to_string(),
            ));
        }
        if size > MAX_WORKERS {
            return Err(HubError::InvalidConfig(format!(
                "worker pool size {size} exceeds the maximum of {MAX_WORKERS}"
            )));
        }
        if name.contains('\0') {
            return Err(HubError::InvalidConfig(
                "worker thread name must not contain NUL bytes".to_string(),
            ));
        }

        let (sender, receiver) = unbounded::<Task>();
        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || Self::worker_loop(receiver))?;
            workers.push(handle);
        }

        debug!(size, name, "Worker pool started");

        Ok(Self {
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(workers),
            size,
        })
    }

    fn worker_loop(receiver: Receiver<Task>) {
        // Ends once the queue is closed and empty.
        for task in receiver.iter() {
            run_task(task, "background");
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.sender.read().as_ref().map_or(0, Sender::len)
    }

    /// Check if the pool still accepts tasks.
    pub fn is_running(&self) -> bool {
        self.sender.read().is_some()
    }

    /// Stop accepting tasks and wait for queued ones to finish.
    ///
    /// Safe to call from a worker thread; that worker is not joined.
    pub fn shutdown(&self) {
        if self.sender.write().take().is_none() {
            return;
        }

        let current = thread::current().id();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                warn!("Worker thread exited abnormally");
            }
        }
        debug!(size = self.size, "Worker pool stopped");
    }
}

impl Executor for WorkerPool {
    fn execute(&self, task: Task) -> Result<()> {
        let sender = self.sender.read();
        let sender = sender.as_ref().ok_or(HubError::ExecutorShutdown)?;
        sender.send(task).map_err(|_| HubError::ExecutorShutdown)
    }

    fn is_current(&self) -> bool {
        let current = thread::current().id();
        self.workers
            .lock()
            .iter()
            .any(|worker| worker.thread().id() == current)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
