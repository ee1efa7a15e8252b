//! Cache invalidation driven by write statements
//!
//! Matching is a case-insensitive substring test of the unqualified table name against
//! cache keys. It may drop unrelated entries whose key happens to contain the name, but
//! never keeps an entry that mentions the written table.

use super::cache::CacheStore;
use super::statement::extract_table;
use std::sync::Arc;
use tracing::debug;

pub struct InvalidationEngine {
    cache: Arc<CacheStore>,
}

impl InvalidationEngine {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self { cache }
    }

    /// Invalidate entries referencing the table a write statement touches.
    /// Statements without a recognizable table are a no-op.
    pub fn invalidate(&self, statement: &str) -> usize {
        match extract_table(statement) {
            Some(table) => self.invalidate_table(&table),
            None => {
                debug!("No table found in statement, skipping invalidation");
                0
            }
        }
    }

    /// Remove every cache entry whose key contains `table`, ignoring ASCII case.
    ///
    /// Only the last segment of a qualified name is matched, so `public.sessions` also
    /// drops reads written against plain `sessions`.
    pub fn invalidate_table(&self, table: &str) -> usize {
        let name = table.rsplit('.').next().unwrap_or(table).to_ascii_lowercase();
        if name.is_empty() {
            return 0;
        }
        let removed = self
            .cache
            .invalidate_matching(|key| key.to_ascii_lowercase().contains(&name));
        if removed > 0 {
            debug!("Invalidated {} cache entries for table {}", removed, table);
        }
        removed
    }

    pub fn invalidate_tables<S: AsRef<str>>(&self, tables: &[S]) -> usize {
        tables.iter().map(|t| self.invalidate_table(t.as_ref())).sum()
    }
}
