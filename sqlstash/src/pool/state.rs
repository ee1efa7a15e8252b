use crate::compression::Codec;
use crate::config::StashConfig;
use crate::core::{
    CacheStore, Executor, InvalidationEngine, QueuedWrite, Result, StashError,
    TransactionCoordinator, WriteQueue,
};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, warn};

/// What a single drain attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The pool is closed
    Disconnected,
    /// Another drain holds the permit
    Busy,
    /// Nothing was queued
    Empty,
    /// A batch of this many writes was committed
    Flushed(usize),
    /// A batch of this many writes was rolled back and dropped
    Failed(usize),
}

#[derive(Default)]
struct FlushCounters {
    batches_flushed: AtomicU64,
    batches_failed: AtomicU64,
    writes_flushed: AtomicU64,
    writes_dropped: AtomicU64,
}

/// Flush counters snapshot
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FlushStats {
    pub batches_flushed: u64,
    pub batches_failed: u64,
    pub writes_flushed: u64,
    pub writes_dropped: u64,
}

/// Everything the foreground calls and the background schedulers share
pub(crate) struct PoolState {
    pub(crate) config: StashConfig,
    executor: RwLock<Option<Arc<dyn Executor>>>,
    pub(crate) cache: Arc<CacheStore>,
    pub(crate) invalidation: Arc<InvalidationEngine>,
    pub(crate) queue: WriteQueue,
    pub(crate) coordinator: TransactionCoordinator,
    pub(crate) codec: Arc<dyn Codec>,
    counters: FlushCounters,
}

impl PoolState {
    pub(crate) fn new(
        config: StashConfig,
        executor: Arc<dyn Executor>,
        codec: Arc<dyn Codec>,
    ) -> Self {
        let cache = Arc::new(CacheStore::new(config.cache_size));
        let invalidation = Arc::new(InvalidationEngine::new(Arc::clone(&cache)));
        let coordinator =
            TransactionCoordinator::new(config.query_timeout(), Arc::clone(&invalidation));

        Self {
            config,
            executor: RwLock::new(Some(executor)),
            cache,
            invalidation,
            queue: WriteQueue::new(),
            coordinator,
            codec,
            counters: FlushCounters::default(),
        }
    }

    /// The live executor, if the pool has not been closed
    pub(crate) fn executor(&self) -> Option<Arc<dyn Executor>> {
        self.executor.read().clone()
    }

    pub(crate) fn require_executor(&self) -> Result<Arc<dyn Executor>> {
        self.executor().ok_or(StashError::NotConnected)
    }

    /// Detach the executor; later calls see the pool as closed
    pub(crate) fn disconnect(&self) -> Option<Arc<dyn Executor>> {
        self.executor.write().take()
    }

    /// Queue a write unless the pool has been closed; returns the new queue depth.
    ///
    /// The executor slot stays read-locked while the write is pushed, so a write either
    /// lands before `disconnect` and is flushed by the final drain, or is refused.
    pub(crate) fn enqueue_if_connected(&self, write: QueuedWrite) -> Result<usize> {
        let slot = self.executor.read();
        if slot.is_none() {
            return Err(StashError::NotConnected);
        }
        Ok(self.queue.enqueue(write))
    }

    /// Drop whatever is still queued, counting it as lost
    pub(crate) fn discard_queued(&self) -> usize {
        let Some(permit) = self.queue.try_begin_drain() else {
            return 0;
        };
        let lost = self.queue.take_batch(&permit, usize::MAX).len();
        if lost > 0 {
            warn!("Discarding {} queued writes that were never flushed", lost);
            self.counters
                .writes_dropped
                .fetch_add(lost as u64, Ordering::Relaxed);
        }
        lost
    }

    /// Flush one batch from the front of the write queue inside a transaction.
    ///
    /// A no-op when closed, when another drain is running or when the queue is empty.
    /// Failures roll the batch back, are logged and the batch is dropped.
    pub(crate) async fn drain(&self) -> DrainOutcome {
        match self.executor() {
            Some(executor) => self.drain_with(executor).await,
            None => DrainOutcome::Disconnected,
        }
    }

    /// [`PoolState::drain`] on an executor that may already be detached
    async fn drain_with(&self, executor: Arc<dyn Executor>) -> DrainOutcome {
        let Some(permit) = self.queue.try_begin_drain() else {
            return DrainOutcome::Busy;
        };

        let batch = self.queue.take_batch(&permit, self.config.batch_size);
        if batch.is_empty() {
            return DrainOutcome::Empty;
        }

        let count = batch.len();
        debug!("Flushing batch of {} writes", count);

        let result = self
            .coordinator
            .run(executor, move |tx| {
                Box::pin(async move {
                    for write in &batch {
                        tx.execute(&write.statement, &write.params).await?;
                    }
                    Ok::<(), StashError>(())
                })
            })
            .await;

        let outcome = match result {
            Ok(()) => {
                self.counters.batches_flushed.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .writes_flushed
                    .fetch_add(count as u64, Ordering::Relaxed);
                DrainOutcome::Flushed(count)
            }
            Err(e) => {
                error!("Dropping batch of {} writes: {}", count, e);
                self.counters.batches_failed.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .writes_dropped
                    .fetch_add(count as u64, Ordering::Relaxed);
                DrainOutcome::Failed(count)
            }
        };

        drop(permit);
        outcome
    }

    /// Drain until the queue is empty, waiting out drains started elsewhere
    pub(crate) async fn drain_all(&self) {
        if let Some(executor) = self.executor() {
            self.drain_all_with(&executor).await;
        }
    }

    pub(crate) async fn drain_all_with(&self, executor: &Arc<dyn Executor>) {
        loop {
            let finished = self.queue.drain_finished();
            tokio::pin!(finished);
            finished.as_mut().enable();

            match self.drain_with(Arc::clone(executor)).await {
                DrainOutcome::Flushed(_) | DrainOutcome::Failed(_) => continue,
                DrainOutcome::Busy => finished.await,
                DrainOutcome::Empty | DrainOutcome::Disconnected => break,
            }
        }
    }

    pub(crate) fn flush_stats(&self) -> FlushStats {
        FlushStats {
            batches_flushed: self.counters.batches_flushed.load(Ordering::Relaxed),
            batches_failed: self.counters.batches_failed.load(Ordering::Relaxed),
            writes_flushed: self.counters.writes_flushed.load(Ordering::Relaxed),
            writes_dropped: self.counters.writes_dropped.load(Ordering::Relaxed),
        }
    }
}
