//! The public pool handle.
//!
//! `StashPool` classifies every statement it is given. Reads are served from the result
//! cache when possible, writes invalidate the cache and are queued for batched flushing,
//! anything else runs directly. Two background tasks flush the queue and trim the cache
//! for as long as the pool is connected.
//!
//! Queued writes are best effort: a failed batch is rolled back, logged and dropped, and
//! the caller that queued it only ever saw a zero-row placeholder. Callers that need the
//! real outcome pass [`QueryOptions::immediate`].

mod router;
mod scheduler;
mod state;

pub use state::{DrainOutcome, FlushStats};

use crate::compression::{BincodeCodec, Codec};
use crate::config::StashConfig;
use crate::core::{
    BulkInsertResult, CacheStats, Connector, Executor, QueryOptions, QueryResult, Result,
    StashError, TxSession, Value, build_bulk_insert,
};
use futures::future::BoxFuture;
use scheduler::Scheduler;
use serde::Serialize;
use state::PoolState;
use std::sync::Arc;
use tracing::{info, warn};

/// Point-in-time view of the pool
#[derive(Debug, Clone, Serialize)]
pub struct StashStats {
    pub cache: CacheStats,
    pub queue_depth: usize,
    pub draining: bool,
    pub flush: FlushStats,
}

/// Cache-and-coalesce front for an external connection pool
#[derive(Clone)]
pub struct StashPool {
    state: Arc<PoolState>,
    scheduler: Arc<Scheduler>,
}

impl StashPool {
    /// Validate `config`, build the external pool and start the background schedulers
    pub async fn connect<C>(config: StashConfig, connector: &C) -> Result<Self>
    where
        C: Connector + ?Sized,
    {
        let codec = Arc::new(BincodeCodec::new(config.compression_algorithm));
        Self::connect_with_codec(config, connector, codec).await
    }

    /// Same as [`StashPool::connect`] with a custom payload codec
    pub async fn connect_with_codec<C>(
        config: StashConfig,
        connector: &C,
        codec: Arc<dyn Codec>,
    ) -> Result<Self>
    where
        C: Connector + ?Sized,
    {
        config.validate()?;

        let executor = connector
            .connect(&config.pool_options())
            .await
            .map_err(|e| StashError::execution("CONNECT", e))?;

        Ok(Self::from_executor(config, executor, codec))
    }

    fn from_executor(
        config: StashConfig,
        executor: Arc<dyn Executor>,
        codec: Arc<dyn Codec>,
    ) -> Self {
        info!(
            "Connecting pool (connections={}, cache={}, batch={}, smart_cache={})",
            config.connection_limit, config.cache_size, config.batch_size, config.smart_cache
        );

        let state = Arc::new(PoolState::new(config, executor, codec));
        let scheduler = Arc::new(Scheduler::start(&state));
        Self { state, scheduler }
    }

    /// Route one statement
    pub async fn query(
        &self,
        statement: &str,
        params: &[Value],
        options: QueryOptions,
    ) -> Result<QueryResult> {
        self.state.route(statement, params, options).await
    }

    /// Run `work` in its own transaction after flushing every queued write.
    ///
    /// ```rust,ignore
    /// pool.transaction(|tx| Box::pin(async move {
    ///     tx.execute("UPDATE accounts SET balance = balance - 10 WHERE id = $1", &[1.into()]).await?;
    ///     tx.execute("UPDATE accounts SET balance = balance + 10 WHERE id = $1", &[2.into()]).await?;
    ///     Ok(())
    /// })).await?;
    /// ```
    pub async fn transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t mut TxSession) -> BoxFuture<'t, Result<T>>,
    {
        let executor = self.state.require_executor()?;
        self.state.drain_all().await;
        self.state.coordinator.run(executor, work).await
    }

    /// Insert `rows` into `table` with one multi-row INSERT per `batch_size` rows.
    ///
    /// The cache is invalidated for `table` once before the first chunk. Chunks run
    /// directly on the pool in order; the first failure stops the insert.
    pub async fn bulk_insert(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<BulkInsertResult> {
        let executor = self.state.require_executor()?;

        if table.trim().is_empty() {
            return Err(StashError::InvalidInput("table name is empty".into()));
        }
        if columns.is_empty() {
            return Err(StashError::InvalidInput("no columns given".into()));
        }
        if let Some(pos) = rows.iter().position(|row| row.len() != columns.len()) {
            return Err(StashError::InvalidInput(format!(
                "row {} has {} values, expected {}",
                pos,
                rows[pos].len(),
                columns.len()
            )));
        }

        self.state.invalidation.invalidate_table(table);

        let mut total = BulkInsertResult::default();
        for chunk in rows.chunks(self.state.config.batch_size) {
            let (statement, params) = build_bulk_insert(table, columns, chunk);
            let result = self
                .state
                .execute_direct(&executor, &statement, &params)
                .await?;
            total.row_count += result.row_count;
            total.statements += 1;
        }

        Ok(total)
    }

    /// Trigger a single drain of at most `batch_size` writes
    pub async fn drain(&self) -> DrainOutcome {
        self.state.drain().await
    }

    /// Flush every queued write now, waiting for any drain already in progress
    pub async fn flush(&self) -> Result<()> {
        self.state.require_executor()?;
        self.state.drain_all().await;
        Ok(())
    }

    /// Drop every cached result; returns the number of removed entries
    pub fn clear_cache(&self) -> usize {
        self.state.cache.clear()
    }

    /// Drop cached results that mention `table`
    pub fn invalidate_table(&self, table: &str) -> usize {
        self.state.invalidation.invalidate_table(table)
    }

    /// Stop the schedulers, flush what is left in the queue and release the pool.
    ///
    /// A failing final flush is logged and does not prevent teardown. Closing an
    /// already closed pool does nothing.
    pub async fn close(&self) -> Result<()> {
        // Detach first: from here on no new write can be queued
        let Some(executor) = self.state.disconnect() else {
            return Ok(());
        };

        self.scheduler.stop().await;
        self.state.drain_all_with(&executor).await;
        self.state.discard_queued();

        if let Err(e) = executor.close().await {
            warn!("Error while closing pool: {:#}", e);
        }
        self.state.cache.clear();

        info!("Pool closed");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.state.executor().is_some()
    }

    pub fn config(&self) -> &StashConfig {
        &self.state.config
    }

    pub fn stats(&self) -> StashStats {
        StashStats {
            cache: self.state.cache.stats(),
            queue_depth: self.state.queue.len(),
            draining: self.state.queue.is_draining(),
            flush: self.state.flush_stats(),
        }
    }
}
