//! To-do aggregation settings loaded via OrthoConfig.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{DEFAULT_CACHE_TTL, DEFAULT_LIMIT, NeedsConfig, NeedsOptions};
use crate::presenter::{DEFAULT_FETCH_LIMIT, DEFAULT_VISIBLE_LIMIT, PresenterConfig};

/// Operational knobs of the to-do lists.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "TODO")]
pub struct TodoSettings {
    /// Kill switch returning empty grading lists.
    #[ortho_config(default = false)]
    pub disable_grading_queries: bool,
    /// Lifetime of cached results, in seconds.
    pub cache_ttl_seconds: Option<u64>,
    /// Items the presenter fetches per category.
    pub fetch_limit: Option<usize>,
    /// Items the presenter shows per category.
    pub visible_limit: Option<usize>,
    /// Default truncation of needs-queries.
    pub default_limit: Option<usize>,
    /// Redis connection URL; the in-memory cache is used when absent.
    pub redis_url: Option<String>,
}

impl TodoSettings {
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl_seconds
            .map_or(DEFAULT_CACHE_TTL, Duration::from_secs)
    }

    pub fn needs_config(&self) -> NeedsConfig {
        NeedsConfig {
            disable_grading_queries: self.disable_grading_queries,
            cache_ttl: self.cache_ttl(),
        }
    }

    pub fn presenter_config(&self) -> PresenterConfig {
        PresenterConfig {
            fetch_limit: self.fetch_limit.unwrap_or(DEFAULT_FETCH_LIMIT),
            visible_limit: self.visible_limit.unwrap_or(DEFAULT_VISIBLE_LIMIT),
        }
    }

    /// Options for callers that query the needs-queries directly.
    pub fn default_options(&self) -> NeedsOptions {
        NeedsOptions::with_limit(Some(self.default_limit.unwrap_or(DEFAULT_LIMIT)))
    }
}
