//! Search configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LanceError, Result};
use crate::similarity;

/// Configuration for an [`IndexSearcher`](crate::search::IndexSearcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Name of the similarity in the similarity registry.
    pub similarity: String,
    /// Worker threads for searching segments; `None` uses every core.
    pub num_threads: Option<usize>,
    /// Maximum matching documents collected per segment.
    pub max_docs_scanned: Option<u64>,
    /// Wall-clock budget for one search, in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            similarity: similarity::LUCENE.to_string(),
            num_threads: None,
            max_docs_scanned: None,
            timeout_ms: None,
        }
    }
}

impl SearchConfig {
    /// Parse a configuration from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SearchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the similarity name.
    pub fn with_similarity<S: Into<String>>(mut self, name: S) -> Self {
        self.similarity = name.into();
        self
    }

    /// Set the number of worker threads.
    pub fn with_num_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads);
        self
    }

    /// Set the per-segment document budget.
    pub fn with_max_docs_scanned(mut self, max_docs: u64) -> Self {
        self.max_docs_scanned = Some(max_docs);
        self
    }

    /// Set the search timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Resolved worker thread count.
    pub fn threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }

    /// Search timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Check the configuration for invalid values.
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == Some(0) {
            return Err(LanceError::config("num_threads must be at least 1"));
        }
        if similarity::by_name(&self.similarity).is_none() {
            return Err(LanceError::config(format!(
                "unknown similarity '{}'",
                self.similarity
            )));
        }
        Ok(())
    }
}
