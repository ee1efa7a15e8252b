//! Transaction scopes over dedicated pool sessions
//!
//! Every scope acquires its own session, runs BEGIN, the unit of work and COMMIT, and rolls
//! back on any failure. The session goes back to the pool when the [`TxSession`] is dropped,
//! which covers success, failure and cancellation of the surrounding future alike.

use super::error::{Result, StashError};
use super::executor::{Executor, Session, timed};
use super::invalidation::InvalidationEngine;
use super::statement::{classify, extract_table};
use super::types::{QueryResult, Value};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Handle given to a unit of work, bound to one BEGIN..COMMIT/ROLLBACK scope
pub struct TxSession {
    executor: Arc<dyn Executor>,
    session: Option<Box<dyn Session>>,
    timeout: Duration,
    touched_tables: Vec<String>,
}

impl TxSession {
    fn new(executor: Arc<dyn Executor>, session: Box<dyn Session>, timeout: Duration) -> Self {
        Self {
            executor,
            session: Some(session),
            timeout,
            touched_tables: Vec::new(),
        }
    }

    /// Execute a statement inside the transaction
    pub async fn execute(&mut self, statement: &str, params: &[Value]) -> Result<QueryResult> {
        if classify(statement).is_write() {
            if let Some(table) = extract_table(statement) {
                if !self.touched_tables.contains(&table) {
                    self.touched_tables.push(table);
                }
            }
        }

        let timeout = self.timeout;
        let session = self.session()?;
        timed(timeout, statement, session.execute(statement, params)).await
    }

    /// Tables written so far in this scope
    pub fn touched_tables(&self) -> &[String] {
        &self.touched_tables
    }

    fn session(&mut self) -> Result<&mut (dyn Session + 'static)> {
        self.session.as_deref_mut().ok_or(StashError::NotConnected)
    }

    async fn rollback_quietly(&mut self) {
        let timeout = self.timeout;
        let Ok(session) = self.session() else {
            return;
        };
        if let Err(e) = timed(timeout, "ROLLBACK", session.rollback()).await {
            warn!("Rollback failed: {}", e);
        }
    }
}

impl Drop for TxSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.executor.release(session);
        }
    }
}

/// Runs units of work in their own transaction and invalidates the cache for every table
/// written inside the scope once it ends
pub struct TransactionCoordinator {
    timeout: Duration,
    invalidation: Arc<InvalidationEngine>,
}

impl TransactionCoordinator {
    pub fn new(timeout: Duration, invalidation: Arc<InvalidationEngine>) -> Self {
        Self {
            timeout,
            invalidation,
        }
    }

    /// Run `work` between BEGIN and COMMIT on a dedicated session.
    ///
    /// A failure of the unit of work or of COMMIT triggers a rollback and comes back as
    /// [`StashError::TransactionFailure`] wrapping the original cause. Failing to acquire a
    /// session or to BEGIN is returned as is, since no transaction was open.
    pub async fn run<T, F>(&self, executor: Arc<dyn Executor>, work: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t mut TxSession) -> BoxFuture<'t, Result<T>>,
    {
        let session = timed(self.timeout, "ACQUIRE", executor.acquire()).await?;
        let mut tx = TxSession::new(executor, session, self.timeout);

        {
            let timeout = self.timeout;
            let session = tx.session()?;
            timed(timeout, "BEGIN", session.begin()).await?;
        }
        debug!("Transaction BEGIN");

        let result = match work(&mut tx).await {
            Ok(value) => {
                let timeout = self.timeout;
                let committed = match tx.session() {
                    Ok(session) => timed(timeout, "COMMIT", session.commit()).await,
                    Err(e) => Err(e),
                };
                match committed {
                    Ok(()) => {
                        debug!("Transaction COMMIT");
                        Ok(value)
                    }
                    Err(e) => {
                        tx.rollback_quietly().await;
                        Err(StashError::rolled_back(e))
                    }
                }
            }
            Err(e) => {
                debug!("Transaction ROLLBACK: {}", e);
                tx.rollback_quietly().await;
                Err(StashError::rolled_back(e))
            }
        };

        self.invalidation.invalidate_tables(tx.touched_tables());
        result
    }
}
