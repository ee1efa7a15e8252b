pub mod cache;
pub mod error;
pub mod executor;
pub mod invalidation;
pub mod queue;
pub mod statement;
pub mod transaction;
pub mod types;

pub use cache::{CacheStats, CacheStore};
pub use error::{Result, StashError};
pub use executor::{Connector, Executor, PoolOptions, Session};
pub use invalidation::InvalidationEngine;
pub use queue::{DrainPermit, QueuedWrite, WriteQueue};
pub use statement::{build_bulk_insert, cache_key, classify, extract_table};
pub use transaction::{TransactionCoordinator, TxSession};
pub use types::{BulkInsertResult, Command, Field, QueryOptions, QueryResult, Row, Value};
