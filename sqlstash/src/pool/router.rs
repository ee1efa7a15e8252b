//! Statement routing: reads through the cache, writes through the queue, everything
//! else straight to the executor.

use super::state::PoolState;
use crate::core::executor::timed;
use crate::core::{
    Command, Executor, QueryOptions, QueryResult, QueuedWrite, Result, StashError, Value,
    cache_key, classify,
};
use std::sync::Arc;
use tracing::{debug, warn};

impl PoolState {
    pub(crate) async fn route(
        &self,
        statement: &str,
        params: &[Value],
        options: QueryOptions,
    ) -> Result<QueryResult> {
        let executor = self.require_executor()?;

        match classify(statement) {
            Command::Select if self.caching_enabled(options) => {
                self.cached_read(&executor, statement, params).await
            }
            command if command.is_write() => {
                self.queue_write(&executor, command, statement, params, options)
                    .await
            }
            _ => self.execute_direct(&executor, statement, params).await,
        }
    }

    fn caching_enabled(&self, options: QueryOptions) -> bool {
        self.config.smart_cache && options.cache.unwrap_or(true)
    }

    pub(crate) async fn execute_direct(
        &self,
        executor: &Arc<dyn Executor>,
        statement: &str,
        params: &[Value],
    ) -> Result<QueryResult> {
        timed(
            self.config.query_timeout(),
            statement,
            executor.execute(statement, params),
        )
        .await
    }

    async fn cached_read(
        &self,
        executor: &Arc<dyn Executor>,
        statement: &str,
        params: &[Value],
    ) -> Result<QueryResult> {
        let key = cache_key(statement, params)?;

        if let Some(payload) = self.cache.get(&key) {
            return match self.codec.decode(&payload) {
                Ok(result) => Ok(result),
                Err(e) => {
                    warn!("Removing corrupted cache entry {}: {}", key, e);
                    self.cache.remove(&key);
                    Err(StashError::CacheCorruption {
                        key,
                        reason: e.to_string(),
                    })
                }
            };
        }

        // A write invalidating this table while the read is in flight makes the result stale
        let generation = self.cache.generation();
        let result = self.execute_direct(executor, statement, params).await?;
        match self.codec.encode(&result, self.config.compression_level) {
            Ok(payload) => {
                self.cache.put_if_current(key, payload, generation);
            }
            Err(e) => warn!("Result of {} not cached: {}", statement, e),
        }
        Ok(result)
    }

    /// Invalidate, enqueue, and flush when the batch threshold is reached or the caller
    /// asked for immediate execution. Immediate writes are then also executed directly
    /// so the caller gets the real result.
    async fn queue_write(
        &self,
        executor: &Arc<dyn Executor>,
        command: Command,
        statement: &str,
        params: &[Value],
        options: QueryOptions,
    ) -> Result<QueryResult> {
        self.invalidation.invalidate(statement);

        let depth =
            self.enqueue_if_connected(QueuedWrite::new(statement, params.to_vec(), command))?;

        if depth >= self.config.batch_size || options.immediate {
            let outcome = self.drain().await;
            debug!("Foreground drain at depth {}: {:?}", depth, outcome);
        }

        if options.immediate {
            let result = self.execute_direct(executor, statement, params).await?;
            self.invalidation.invalidate(statement);
            return Ok(result);
        }

        Ok(QueryResult::queued(command))
    }
}
