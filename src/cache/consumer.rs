//! Cache consumer for executing invalidation plans.
//!
//! Drains mutation events, invalidates every query the planned tags reach
//! (cached or still loading), then refetches the queries that are displayed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use metrics::{counter, histogram};
use tracing::{info, instrument};
use uuid::Uuid;

use super::config::CacheConfig;
use super::events::EventQueue;
use super::keys::QueryKey;
use super::planner::InvalidationPlan;
use super::runner::QueryRunner;
use super::subscriptions::Subscriptions;

const METRIC_CACHE_CONSUME_MS: &str = "folio_cache_consume_ms";
const METRIC_CACHE_REFETCH_TOTAL: &str = "folio_cache_refetch_total";

pub struct CacheConsumer {
    config: CacheConfig,
    queue: Arc<EventQueue>,
    subscriptions: Arc<Subscriptions>,
    runner: Arc<QueryRunner>,
}

impl CacheConsumer {
    pub fn new(
        config: CacheConfig,
        queue: Arc<EventQueue>,
        subscriptions: Arc<Subscriptions>,
        runner: Arc<QueryRunner>,
    ) -> Self {
        Self {
            config,
            queue,
            subscriptions,
            runner,
        }
    }

    /// Consume pending events and execute the plan.
    ///
    /// Returns true if any events were processed.
    #[instrument(skip(self))]
    pub async fn consume(&self) -> bool {
        let consume_started_at = Instant::now();
        let events = self.queue.drain(self.config.batch_limit());
        if events.is_empty() {
            return false;
        }

        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let plan = InvalidationPlan::from_events(events);

        info!(
            event_count,
            event_ids = ?event_ids,
            plan = %plan,
            "Cache consumption starting"
        );

        let invalidated = self.runner.invalidate_tags(&plan.invalidate_tags);
        let (refetched, failed) = self.refetch_active(&plan, &invalidated).await;

        info!(
            event_count,
            invalidated = invalidated.len(),
            refetched,
            failed,
            "Cache consumption complete"
        );

        histogram!(METRIC_CACHE_CONSUME_MS)
            .record(consume_started_at.elapsed().as_secs_f64() * 1000.0);

        true
    }

    /// Refetch displayed queries the plan touched, concurrently.
    ///
    /// A displayed query counts as touched when it was invalidated or when a
    /// planned tag covers its base tag (a query that failed never registered).
    async fn refetch_active(
        &self,
        plan: &InvalidationPlan,
        invalidated: &HashSet<QueryKey>,
    ) -> (usize, usize) {
        self.subscriptions.prune();

        let targets: Vec<QueryKey> = self
            .subscriptions
            .active_keys()
            .into_iter()
            .filter(|key| {
                invalidated.contains(key)
                    || plan
                        .invalidate_tags
                        .iter()
                        .any(|tag| tag.covers(&key.base_tag()))
            })
            .collect();

        if targets.is_empty() {
            return (0, 0);
        }

        let results = join_all(targets.iter().map(|key| self.runner.fetch(key))).await;
        let failed = results.iter().filter(|result| result.is_err()).count();

        counter!(METRIC_CACHE_REFETCH_TOTAL).increment(targets.len() as u64);
        (targets.len(), failed)
    }
}
