//! Query cache configuration (`[cache]` in `folio.toml`).

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_POST_LIMIT: usize = 500;
const DEFAULT_COMMENT_LIST_LIMIT: usize = 200;
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache query results and invalidate them on mutation.
    pub enabled: bool,
    /// Maximum cached `getPost` results.
    pub post_limit: usize,
    /// Maximum cached `listComments` results.
    pub comment_list_limit: usize,
    /// Maximum events drained per consumption.
    pub consume_batch_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            post_limit: DEFAULT_POST_LIMIT,
            comment_list_limit: DEFAULT_COMMENT_LIST_LIMIT,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            post_limit: settings.post_limit,
            comment_list_limit: settings.comment_list_limit,
            consume_batch_limit: settings.consume_batch_limit,
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Clamped to 1 when configured as zero.
    pub fn post_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.post_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// Clamped to 1 when configured as zero.
    pub fn comment_list_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.comment_list_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub(crate) fn batch_limit(&self) -> usize {
        self.consume_batch_limit.max(1)
    }
}
