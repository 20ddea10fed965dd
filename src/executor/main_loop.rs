//! A serial task queue owned by one "main" thread.
//!
//! The thread that creates a [`MainLoop`] owns it and is the only one allowed
//! to run its tasks. Any thread may submit through a [`MainLoopExecutor`].
//! Tasks run one at a time, in submission order.

use super::{run_task, Executor, Task};
use crate::error::{HubError, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// The main-context queue. Pump it from the owning thread.
pub struct MainLoop {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    owner: ThreadId,
}

impl MainLoop {
    /// Create a loop owned by the calling thread.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            owner: thread::current().id(),
        }
    }

    /// A handle other threads use to submit tasks.
    pub fn executor(&self) -> MainLoopExecutor {
        MainLoopExecutor {
            sender: self.sender.clone(),
            owner: self.owner,
        }
    }

    /// Tasks queued but not yet run.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Run everything queued right now, returning how many tasks ran.
    ///
    /// Tasks queued by the tasks themselves also run before this returns.
    pub fn run_pending(&self) -> Result<usize> {
        self.check_owner()?;

        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            run_task(task, "main");
            ran += 1;
        }
        Ok(ran)
    }

    /// Run tasks as they arrive for up to `timeout`.
    pub fn run_for(&self, timeout: Duration) -> Result<usize> {
        let mut ran = 0;
        self.run_until(|| false, timeout, &mut ran)?;
        Ok(ran)
    }

    /// Run tasks until `done` returns true or `timeout` elapses.
    ///
    /// `done` is checked before waiting and after every task. Returns whether
    /// the condition was met.
    pub fn run_until_condition<F>(&self, done: F, timeout: Duration) -> Result<bool>
    where
        F: FnMut() -> bool,
    {
        let mut ran = 0;
        self.run_until(done, timeout, &mut ran)
    }

    fn run_until<F>(&self, mut done: F, timeout: Duration, ran: &mut usize) -> Result<bool>
    where
        F: FnMut() -> bool,
    {
        self.check_owner()?;

        let deadline = Instant::now() + timeout;
        loop {
            if done() {
                return Ok(true);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(task) => {
                    run_task(task, "main");
                    *ran += 1;
                }
                Err(RecvTimeoutError::Timeout) => return Ok(done()),
                Err(RecvTimeoutError::Disconnected) => return Ok(done()),
            }
        }
    }

    fn check_owner(&self) -> Result<()> {
        if thread::current().id() == self.owner {
            Ok(())
        } else {
            Err(HubError::ForeignThread)
        }
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Submits tasks to a [`MainLoop`]. Fails once the loop has been dropped.
#[derive(Clone)]
pub struct MainLoopExecutor {
    sender: Sender<Task>,
    owner: ThreadId,
}

impl Executor for MainLoopExecutor {
    fn execute(&self, task: Task) -> Result<()> {
        self.sender.send(task).map_err(|_| HubError::ExecutorShutdown)
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }
}
