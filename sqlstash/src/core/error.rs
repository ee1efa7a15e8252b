use std::time::Duration;
use thiserror::Error;

/// Main error type for sqlstash operations
#[derive(Debug, Error)]
pub enum StashError {
    #[error("Not connected")]
    NotConnected,

    #[error("Execution failed for `{statement}`: {cause:#}")]
    ExecutionFailure {
        statement: String,
        cause: anyhow::Error,
    },

    #[error("Statement `{statement}` timed out after {after:?}")]
    Timeout { statement: String, after: Duration },

    #[error("Corrupted cache entry {key}: {reason}")]
    CacheCorruption { key: String, reason: String },

    #[error("Transaction rolled back: {source}")]
    TransactionFailure {
        #[source]
        source: Box<StashError>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Codec error: {0}")]
    Codec(String),
}

impl StashError {
    /// Wrap an executor failure together with the statement that caused it
    pub fn execution(statement: impl Into<String>, cause: anyhow::Error) -> Self {
        Self::ExecutionFailure {
            statement: statement.into(),
            cause,
        }
    }

    /// Wrap an error after the enclosing transaction was rolled back
    pub fn rolled_back(source: StashError) -> Self {
        Self::TransactionFailure {
            source: Box::new(source),
        }
    }

    /// Transient failures a caller may reasonably retry
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ExecutionFailure { .. } | Self::Timeout { .. } => true,
            Self::TransactionFailure { source } => source.is_retryable(),
            Self::NotConnected
            | Self::CacheCorruption { .. }
            | Self::InvalidInput(_)
            | Self::Config(_)
            | Self::Codec(_) => false,
        }
    }

    /// The innermost error, looking through transaction wrappers
    pub fn root_cause(&self) -> &StashError {
        match self {
            Self::TransactionFailure { source } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for sqlstash operations
pub type Result<T> = std::result::Result<T, StashError>;
