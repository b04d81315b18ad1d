//! Pending-task queue for native work that finishes after the call returns.
//!
//! A trampoline queues a [`PendingTask`] with
//! [`CallContext::defer`](crate::CallContext::defer). The host pumps the queue
//! on its own thread; each finished task yields a [`Completed`] holding the
//! script callback, the values kept alive for it, and the outcome.

use std::fmt;

use classbind_core::{CallError, Dynamic};

/// Result of polling a task once.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPoll {
    /// Not finished; poll again on the next pump.
    Pending,
    /// Finished with a value.
    Ready(Dynamic),
    /// Finished with an error message.
    Failed(String),
}

/// A unit of deferred native work.
pub trait PendingTask {
    fn poll(&mut self) -> TaskPoll;
}

impl<F> PendingTask for F
where
    F: FnMut() -> TaskPoll,
{
    fn poll(&mut self) -> TaskPoll {
        self()
    }
}

/// A queued task with its callback.
pub struct PendingEntry {
    task: Box<dyn PendingTask>,
    callback: Dynamic,
    keep_alive: Vec<Dynamic>,
}

impl PendingEntry {
    pub fn new(task: impl PendingTask + 'static, callback: Dynamic, keep_alive: Vec<Dynamic>) -> Self {
        Self {
            task: Box::new(task),
            callback,
            keep_alive,
        }
    }

    pub fn callback(&self) -> &Dynamic {
        &self.callback
    }

    /// Values held for the callback; their references are released after it runs.
    pub fn keep_alive(&self) -> &[Dynamic] {
        &self.keep_alive
    }

    pub fn into_keep_alive(self) -> Vec<Dynamic> {
        self.keep_alive
    }
}

impl fmt::Debug for PendingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingEntry")
            .field("callback", &self.callback)
            .field("keep_alive", &self.keep_alive)
            .finish_non_exhaustive()
    }
}

/// A finished task, ready for its callback.
#[derive(Debug)]
pub struct Completed {
    pub callback: Dynamic,
    pub keep_alive: Vec<Dynamic>,
    pub outcome: Result<Dynamic, String>,
}

impl Completed {
    /// Arguments for the callback: `(keep_alive..., ok, payload)`.
    pub fn callback_args(&self) -> Vec<Dynamic> {
        let mut args = self.keep_alive.clone();
        match &self.outcome {
            Ok(value) => {
                args.push(Dynamic::Bool(true));
                args.push(value.clone());
            }
            Err(message) => {
                args.push(Dynamic::Bool(false));
                args.push(Dynamic::String(message.clone()));
            }
        }
        args
    }
}

/// FIFO queue of pending tasks with a fixed capacity.
#[derive(Debug)]
pub struct PendingQueue {
    entries: Vec<PendingEntry>,
    capacity: usize,
}

impl PendingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fails with `QueueFull` when one more task would not fit.
    pub fn check_capacity(&self) -> Result<(), CallError> {
        if self.entries.len() >= self.capacity {
            Err(CallError::QueueFull {
                capacity: self.capacity,
            })
        } else {
            Ok(())
        }
    }

    pub fn push(&mut self, entry: PendingEntry) -> Result<(), CallError> {
        self.check_capacity()?;
        self.entries.push(entry);
        Ok(())
    }

    /// Poll tasks in queue order and remove the finished ones.
    ///
    /// Stops once `limit` tasks have finished; `0` means no limit. Tasks after
    /// that point are not polled on this pass.
    pub fn poll_ready(&mut self, limit: usize) -> Vec<Completed> {
        let mut done = Vec::new();
        let mut index = 0;
        while index < self.entries.len() && (limit == 0 || done.len() < limit) {
            let outcome = match self.entries[index].task.poll() {
                TaskPoll::Pending => {
                    index += 1;
                    continue;
                }
                TaskPoll::Ready(value) => Ok(value),
                TaskPoll::Failed(message) => Err(message),
            };
            let entry = self.entries.remove(index);
            done.push(Completed {
                callback: entry.callback,
                keep_alive: entry.keep_alive,
                outcome,
            });
        }
        done
    }

    /// Remove every queued task without polling it.
    pub fn drain(&mut self) -> Vec<PendingEntry> {
        std::mem::take(&mut self.entries)
    }
}
