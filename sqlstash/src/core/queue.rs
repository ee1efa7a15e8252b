use super::types::{Command, Value};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::Notify;
use tracing::debug;

/// Write statement waiting to be flushed
#[derive(Debug, Clone)]
pub struct QueuedWrite {
    pub statement: String,
    pub params: Vec<Value>,
    pub command: Command,
    pub enqueued_at: Instant,
}

impl QueuedWrite {
    pub fn new(statement: impl Into<String>, params: Vec<Value>, command: Command) -> Self {
        Self {
            statement: statement.into(),
            params,
            command,
            enqueued_at: Instant::now(),
        }
    }
}

/// FIFO buffer of pending writes plus the single in-flight drain flag.
///
/// Batches are always a contiguous prefix of the queue. Only one holder of a
/// [`DrainPermit`] exists at a time.
pub struct WriteQueue {
    items: Mutex<VecDeque<QueuedWrite>>,
    draining: AtomicBool,
    drain_done: Notify,
}

/// Proof that the caller is the only active drain; releases the flag on drop
pub struct DrainPermit<'a> {
    queue: &'a WriteQueue,
}

impl Drop for DrainPermit<'_> {
    fn drop(&mut self) {
        self.queue.draining.store(false, Ordering::Release);
        self.queue.drain_done.notify_waiters();
    }
}

impl WriteQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            drain_done: Notify::new(),
        }
    }

    /// Append a write; returns the queue length after the push
    pub fn enqueue(&self, write: QueuedWrite) -> usize {
        let mut items = self.items.lock();
        debug!("Queue PUSH {} (depth={})", write.command, items.len() + 1);
        items.push_back(write);
        items.len()
    }

    /// Claim the drain flag. `None` if another drain is in flight.
    pub fn try_begin_drain(&self) -> Option<DrainPermit<'_>> {
        self.draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| DrainPermit { queue: self })
    }

    /// Remove up to `max` writes from the front of the queue.
    ///
    /// Requires the drain permit so batches cannot be taken concurrently.
    pub fn take_batch(&self, _permit: &DrainPermit<'_>, max: usize) -> Vec<QueuedWrite> {
        let mut items = self.items.lock();
        let count = max.min(items.len());
        items.drain(..count).collect()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Resolves after the next drain ends. Enable the future before checking state
    /// to avoid missing the wake-up.
    pub fn drain_finished(&self) -> tokio::sync::futures::Notified<'_> {
        self.drain_done.notified()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}
