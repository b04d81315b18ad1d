//! The pending-task pump.
//!
//! Native work that finishes after its call returns is queued with
//! [`CallContext::defer`](classbind_registry::CallContext::defer). The host
//! calls [`Engine::process_pending`] from the thread that owns the engine;
//! every finished task has its script callback run there.

use tracing::{debug, error};

use crate::engine::Engine;
use crate::properties::EngineProperty;

impl Engine {
    /// Poll queued tasks once and run the callbacks of the finished ones.
    ///
    /// At most `PendingBatchSize` callbacks run per pass (0 means no limit).
    /// A failing callback is logged and does not stop the pass. Returns the
    /// number of callbacks run.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn process_pending(&mut self) -> usize {
        let limit = self.properties.get(EngineProperty::PendingBatchSize);
        let completed = self.pending.poll_ready(limit);
        let count = completed.len();

        for task in completed {
            let args = task.callback_args();
            match self.call_value(&task.callback, &args) {
                Ok(returned) => {
                    self.release(&returned);
                }
                Err(err) => {
                    error!(callback = %task.callback, error = %err, "pending callback failed");
                }
            }
            for value in &task.keep_alive {
                self.release(value);
            }
        }

        if count > 0 {
            debug!(count, remaining = self.pending.len(), "processed pending tasks");
        }
        count
    }

    /// Drop every queued task without running its callback.
    ///
    /// References held for the callbacks are released. Returns the number of
    /// tasks dropped.
    pub fn clear_pending(&mut self) -> usize {
        let entries = self.pending.drain();
        let count = entries.len();
        for entry in entries {
            for value in entry.into_keep_alive() {
                self.release(&value);
            }
        }
        if count > 0 {
            debug!(count, "cleared pending tasks");
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
