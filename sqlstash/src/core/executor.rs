//! Interfaces of the external connection pool.
//!
//! sqlstash never talks to a database itself. A [`Connector`] builds an [`Executor`] for
//! the configured pool size, and the executor hands out [`Session`]s for transactional work.
//! Collaborators report failures as `anyhow::Error`; the layer wraps them with the statement
//! that failed.

use super::error::{Result, StashError};
use super::types::{QueryResult, Value};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Settings handed to the connector when the pool is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    pub connection_limit: usize,
    pub query_timeout: Duration,
}

/// Builds the external pool
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, options: &PoolOptions) -> anyhow::Result<Arc<dyn Executor>>;
}

/// A connection pool able to run single statements and lend out dedicated sessions
#[async_trait]
pub trait Executor: Send + Sync {
    /// Take a dedicated connection out of the pool
    async fn acquire(&self) -> anyhow::Result<Box<dyn Session>>;

    /// Return a session to the pool. Synchronous so it can run from `Drop`.
    fn release(&self, session: Box<dyn Session>);

    /// Run one statement on any pooled connection
    async fn execute(&self, statement: &str, params: &[Value]) -> anyhow::Result<QueryResult>;

    /// Tear the pool down
    async fn close(&self) -> anyhow::Result<()>;
}

/// A dedicated connection bound to one transaction scope at a time
#[async_trait]
pub trait Session: Send {
    async fn execute(&mut self, statement: &str, params: &[Value])
    -> anyhow::Result<QueryResult>;

    async fn begin(&mut self) -> anyhow::Result<()>;

    async fn commit(&mut self) -> anyhow::Result<()>;

    async fn rollback(&mut self) -> anyhow::Result<()>;
}

/// Run one executor round trip under the per-statement timeout
pub(crate) async fn timed<T, F>(limit: Duration, statement: &str, fut: F) -> Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(cause)) => Err(StashError::execution(statement, cause)),
        Err(_) => Err(StashError::Timeout {
            statement: statement.to_string(),
            after: limit,
        }),
    }
}
