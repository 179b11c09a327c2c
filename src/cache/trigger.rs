//! Cache trigger service.
//!
//! Publishes an event for each successful mutation and, by default, consumes
//! it before the mutation returns so displayed queries are already fresh.

use std::sync::Arc;

use tracing::debug;

use super::config::CacheConfig;
use super::consumer::CacheConsumer;
use super::events::{EventKind, EventQueue};

pub struct CacheTrigger {
    config: CacheConfig,
    queue: Arc<EventQueue>,
    consumer: Arc<CacheConsumer>,
}

impl CacheTrigger {
    pub fn new(config: CacheConfig, queue: Arc<EventQueue>, consumer: Arc<CacheConsumer>) -> Self {
        Self {
            config,
            queue,
            consumer,
        }
    }

    /// Publish an event and optionally consume immediately.
    ///
    /// Without `consume_now` the event waits for the next explicit
    /// consumption.
    pub async fn trigger(&self, kind: EventKind, consume_now: bool) {
        if !self.config.is_enabled() {
            debug!(event_kind = ?kind, "Cache trigger skipped: cache disabled");
            return;
        }

        self.queue.publish(kind);

        if consume_now {
            self.consumer.consume().await;
        }
    }

    pub async fn post_created(&self, post_id: &str) {
        self.trigger(
            EventKind::PostCreated {
                post_id: post_id.to_string(),
            },
            true,
        )
        .await;
    }

    pub async fn post_updated(&self, post_id: &str) {
        self.trigger(
            EventKind::PostUpdated {
                post_id: post_id.to_string(),
            },
            true,
        )
        .await;
    }

    pub async fn post_deleted(&self, post_id: &str) {
        self.trigger(
            EventKind::PostDeleted {
                post_id: post_id.to_string(),
            },
            true,
        )
        .await;
    }

    pub async fn comment_created(&self, post_id: &str, comment_id: &str) {
        self.trigger(
            EventKind::CommentCreated {
                post_id: post_id.to_string(),
                comment_id: comment_id.to_string(),
            },
            true,
        )
        .await;
    }

    pub async fn comment_deleted(&self, post_id: &str, comment_id: &str) {
        self.trigger(
            EventKind::CommentDeleted {
                post_id: post_id.to_string(),
                comment_id: comment_id.to_string(),
            },
            true,
        )
        .await;
    }
}
