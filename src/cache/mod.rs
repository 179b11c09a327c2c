//! Folio query cache
//!
//! Caches the results of blog reads and keeps them consistent with writes:
//!
//! - **Queries** (`listPosts`, `getPost`, `listComments`) provide tags
//! - **Mutations** publish events whose tags invalidate matching queries
//! - **Subscriptions** mark queries as displayed; those are refetched at once
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! post_limit = 500
//! comment_list_limit = 200
//! consume_batch_limit = 100
//! ```

mod config;
mod consumer;
mod events;
mod keys;
mod lock;
mod planner;
mod registry;
mod runner;
mod store;
mod subscriptions;
mod trigger;

use std::sync::Arc;

pub use config::CacheConfig;
pub use consumer::CacheConsumer;
pub use events::{CacheEvent, Epoch, EventKind, EventQueue};
pub use keys::{QueryKey, Tag, TagKind};
pub use planner::InvalidationPlan;
pub use registry::TagRegistry;
pub use runner::{QueryRunner, QuerySource};
pub use store::{QueryStore, QueryValue};
pub use subscriptions::{QueryState, Subscription, Subscriptions};
pub use trigger::CacheTrigger;

/// All cache components wired together around one query source.
#[derive(Clone)]
pub struct QueryCache {
    config: CacheConfig,
    store: Arc<QueryStore>,
    registry: Arc<TagRegistry>,
    subscriptions: Arc<Subscriptions>,
    queue: Arc<EventQueue>,
    runner: Arc<QueryRunner>,
    trigger: Arc<CacheTrigger>,
}

impl QueryCache {
    pub fn new(config: CacheConfig, source: Arc<dyn QuerySource>) -> Self {
        let store = Arc::new(QueryStore::new(&config));
        let registry = Arc::new(TagRegistry::new());
        let subscriptions = Arc::new(Subscriptions::new());
        let queue = Arc::new(EventQueue::new());
        let runner = Arc::new(QueryRunner::new(
            config.clone(),
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&subscriptions),
            source,
        ));
        let consumer = Arc::new(CacheConsumer::new(
            config.clone(),
            Arc::clone(&queue),
            Arc::clone(&subscriptions),
            Arc::clone(&runner),
        ));
        let trigger = Arc::new(CacheTrigger::new(
            config.clone(),
            Arc::clone(&queue),
            Arc::clone(&consumer),
        ));

        Self {
            config,
            store,
            registry,
            subscriptions,
            queue,
            runner,
            trigger,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn runner(&self) -> &Arc<QueryRunner> {
        &self.runner
    }

    pub fn trigger(&self) -> &CacheTrigger {
        &self.trigger
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// Drop every cached result and pending event.
    pub fn clear(&self) {
        self.queue.clear();
        self.store.clear();
        self.registry.clear();
    }

    pub fn cached_queries(&self) -> usize {
        self.store.len()
    }
}
