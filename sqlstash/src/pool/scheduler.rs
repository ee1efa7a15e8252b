//! Background flush and eviction loops.
//!
//! Both tasks hold a weak reference to the pool state and stop when the state is gone,
//! when the shutdown signal fires, or when its sender is dropped.

use super::state::PoolState;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub(crate) struct Scheduler {
    shutdown: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Start the flush and eviction tasks for `state`
    pub(crate) fn start(state: &Arc<PoolState>) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let flush_interval = state.config.flush_interval();
        let eviction_interval = state.config.eviction_interval();

        info!(
            "Starting schedulers (flush={}ms, eviction={}ms)",
            flush_interval.as_millis(),
            eviction_interval.as_millis()
        );

        let handles = vec![
            spawn_flush_task(Arc::downgrade(state), flush_interval, rx.clone()),
            spawn_eviction_task(Arc::downgrade(state), eviction_interval, rx),
        ];

        Self {
            shutdown,
            handles: Mutex::new(handles),
        }
    }

    /// Signal both tasks and wait for them; an in-progress drain finishes first
    pub(crate) async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }
}

fn spawn_flush_task(
    state: Weak<PoolState>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }

            let Some(state) = state.upgrade() else { break };
            if state.queue.is_empty() {
                continue;
            }
            let outcome = state.drain().await;
            debug!("Scheduled drain: {:?}", outcome);
        }

        debug!("Flush scheduler stopped");
    })
}

fn spawn_eviction_task(
    state: Weak<PoolState>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }

            let Some(state) = state.upgrade() else { break };
            let evicted = state.cache.trim_overflow();
            if evicted > 0 {
                info!(
                    "Eviction scheduler trimmed {} entries ({} remain)",
                    evicted,
                    state.cache.len()
                );
            }
        }

        debug!("Eviction scheduler stopped");
    })
}
