//! # sqlstash
//!
//! Result cache and write-coalescing layer for relational connection pools.
//!
//! - Reads are served from a bounded, LRU-trimmed cache of compressed result sets
//! - Writes invalidate cached reads of the same table and are flushed in batches, each
//!   batch inside one transaction
//! - Everything else is passed straight to the pool
//!
//! The pool itself is external: implement [`Connector`], [`Executor`] and [`Session`] for
//! your driver.
//!
//! ```rust,ignore
//! use sqlstash::{QueryOptions, StashConfig, StashPool, Value};
//!
//! let pool = StashPool::connect(StashConfig::default(), &my_connector).await?;
//!
//! let users = pool
//!     .query("SELECT * FROM users WHERE id = $1", &[Value::Int(1)], QueryOptions::new())
//!     .await?;
//! pool.query("UPDATE users SET seen = true", &[], QueryOptions::new()).await?;
//!
//! pool.close().await?;
//! ```

pub mod compression;
pub mod config;
pub mod core;
pub mod logging;
pub mod pool;

// Re-export commonly used types
pub use compression::{BincodeCodec, Codec, CompressionAlgorithm, Compressor};
pub use config::{LoggingConfig, StashConfig};
pub use crate::core::{
    BulkInsertResult, CacheStats, Command, Connector, Executor, Field, PoolOptions,
    QueryOptions, QueryResult, Result, Row, Session, StashError, TxSession, Value,
};
pub use logging::init_tracing;
pub use pool::{DrainOutcome, FlushStats, StashPool, StashStats};
