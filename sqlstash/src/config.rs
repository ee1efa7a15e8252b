use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::compression::CompressionAlgorithm;
use crate::compression::compressor::MAX_LEVEL;
use crate::core::{PoolOptions, Result, StashError};

/// Pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StashConfig {
    /// Size of the external connection pool
    pub connection_limit: usize,
    /// Serve reads from the result cache
    pub smart_cache: bool,
    /// Maximum number of cached result sets
    pub cache_size: usize,
    /// Writes per flushed batch, also the bulk insert chunk size
    pub batch_size: usize,
    /// 0 stores payloads uncompressed, 9 compresses hardest
    pub compression_level: u32,
    pub compression_algorithm: CompressionAlgorithm,
    /// Per-statement timeout
    pub query_timeout_ms: u64,
    /// Period of the background write flush
    pub flush_interval_ms: u64,
    /// Period of the background cache trim
    pub eviction_interval_ms: u64,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json`, `pretty` or `compact`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Default for StashConfig {
    fn default() -> Self {
        Self {
            connection_limit: 10,
            smart_cache: true,
            cache_size: 1000,
            batch_size: 100,
            compression_level: 1,
            compression_algorithm: CompressionAlgorithm::Lz4,
            query_timeout_ms: 30_000,
            flush_interval_ms: 100,
            eviction_interval_ms: 30_000,
            logging: LoggingConfig::default(),
        }
    }
}

impl StashConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from a YAML document; missing keys keep their defaults
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        let config: StashConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection_limit == 0 {
            return Err(StashError::Config("connection_limit must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(StashError::Config("batch_size must be at least 1".into()));
        }
        if self.compression_level > MAX_LEVEL {
            return Err(StashError::Config(format!(
                "compression_level must be between 0 and {MAX_LEVEL}, got {}",
                self.compression_level
            )));
        }
        if self.query_timeout_ms == 0
            || self.flush_interval_ms == 0
            || self.eviction_interval_ms == 0
        {
            return Err(StashError::Config(
                "timeouts and intervals must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn with_connection_limit(mut self, limit: usize) -> Self {
        self.connection_limit = limit;
        self
    }

    pub fn with_smart_cache(mut self, enabled: bool) -> Self {
        self.smart_cache = enabled;
        self
    }

    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_compression(mut self, algorithm: CompressionAlgorithm, level: u32) -> Self {
        self.compression_algorithm = algorithm;
        self.compression_level = level;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = saturating_millis(timeout);
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = saturating_millis(interval);
        self
    }

    pub fn with_eviction_interval(mut self, interval: Duration) -> Self {
        self.eviction_interval_ms = saturating_millis(interval);
        self
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms)
    }

    /// Settings passed on to the external pool
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            connection_limit: self.connection_limit,
            query_timeout: self.query_timeout(),
        }
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
