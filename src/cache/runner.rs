//! Query execution against the cache.
//!
//! Reads are served from the [`QueryStore`] when present and fetched from the
//! [`QuerySource`] otherwise. Every invalidation bumps a per-key generation;
//! a fetch that started under an older generation still answers its caller
//! but is never written back to the cache or to subscribers. Tag invalidation
//! also reaches keys that are not cached yet but have a fetch in flight.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use tracing::{debug, warn};

use crate::application::error::QueryError;

use super::config::CacheConfig;
use super::keys::{QueryKey, Tag};
use super::lock::mutex_lock;
use super::registry::TagRegistry;
use super::store::{QueryStore, QueryValue};
use super::subscriptions::{Subscription, Subscriptions};

const SOURCE: &str = "cache::runner";
const METRIC_HIT: &str = "folio_query_cache_hit_total";
const METRIC_MISS: &str = "folio_query_cache_miss_total";
const METRIC_INVALIDATE: &str = "folio_query_cache_invalidate_total";
const METRIC_FETCH_MS: &str = "folio_query_fetch_ms";

/// Where query results come from when the cache cannot answer.
#[async_trait]
pub trait QuerySource: Send + Sync {
    async fn fetch(&self, key: &QueryKey) -> Result<QueryValue, QueryError>;
}

pub struct QueryRunner {
    config: CacheConfig,
    store: Arc<QueryStore>,
    registry: Arc<TagRegistry>,
    subscriptions: Arc<Subscriptions>,
    source: Arc<dyn QuerySource>,
    ledger: Mutex<FetchLedger>,
}

/// Per-key generations and the number of fetches currently running.
#[derive(Default)]
struct FetchLedger {
    generations: HashMap<QueryKey, u64>,
    in_flight: HashMap<QueryKey, usize>,
}

impl FetchLedger {
    fn generation(&self, key: &QueryKey) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: &QueryKey) {
        *self.generations.entry(key.clone()).or_insert(0) += 1;
    }

    fn begin(&mut self, key: &QueryKey) -> u64 {
        *self.in_flight.entry(key.clone()).or_insert(0) += 1;
        self.generation(key)
    }

    fn finish(&mut self, key: &QueryKey) {
        if let Some(count) = self.in_flight.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(key);
            }
        }
    }

    /// Running fetches whose results could overlap a tag in `tags`.
    fn in_flight_touching(&self, tags: &HashSet<Tag>) -> Vec<QueryKey> {
        self.in_flight
            .keys()
            .filter(|key| {
                let base = key.base_tag();
                tags.iter().any(|tag| tag.covers(&base) || base.covers(tag))
            })
            .cloned()
            .collect()
    }
}

impl QueryRunner {
    pub fn new(
        config: CacheConfig,
        store: Arc<QueryStore>,
        registry: Arc<TagRegistry>,
        subscriptions: Arc<Subscriptions>,
        source: Arc<dyn QuerySource>,
    ) -> Self {
        Self {
            config,
            store,
            registry,
            subscriptions,
            source,
            ledger: Mutex::new(FetchLedger::default()),
        }
    }

    /// Cached result if present, otherwise a fetch.
    pub async fn read(&self, key: &QueryKey) -> Result<QueryValue, QueryError> {
        if self.config.is_enabled() {
            if let Some(value) = self.store.get(key) {
                counter!(METRIC_HIT, "endpoint" => key.endpoint()).increment(1);
                debug!(query = %key, "Query served from cache");
                return Ok(value);
            }
            counter!(METRIC_MISS, "endpoint" => key.endpoint()).increment(1);
        }
        self.fetch(key).await
    }

    /// Fetch from the source, bypassing the cached value.
    pub async fn fetch(&self, key: &QueryKey) -> Result<QueryValue, QueryError> {
        let generation = mutex_lock(&self.ledger, SOURCE, "fetch.begin").begin(key);
        self.subscriptions.mark_loading(key);

        let started_at = Instant::now();
        let result = self.source.fetch(key).await;
        histogram!(METRIC_FETCH_MS, "endpoint" => key.endpoint())
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        if let Err(err) = &result {
            warn!(
                query = %key,
                error = %err,
                code = err.code.as_deref().unwrap_or(""),
                "Query failed"
            );
        }

        {
            let mut ledger = mutex_lock(&self.ledger, SOURCE, "fetch.finish");
            ledger.finish(key);
            if ledger.generation(key) != generation {
                debug!(query = %key, "Discarding result of a superseded fetch");
                return result;
            }
            if let (true, Ok(value)) = (self.config.is_enabled(), &result) {
                self.cache(key, value.clone());
            }
        }

        self.subscriptions.publish(key, &result);
        result
    }

    /// Drop the cached result for `key` and forget its tags.
    pub fn invalidate(&self, key: &QueryKey) {
        let mut ledger = mutex_lock(&self.ledger, SOURCE, "invalidate");
        self.invalidate_locked(&mut ledger, key);
    }

    /// Invalidate every query `tags` reach: cached queries that provided a
    /// covered tag, and queries with a fetch in flight whose results overlap
    /// one of the tags. Returns the invalidated keys.
    pub fn invalidate_tags(&self, tags: &HashSet<Tag>) -> HashSet<QueryKey> {
        // Held across the registry lookup so a fetch cannot register in between.
        let mut ledger = mutex_lock(&self.ledger, SOURCE, "invalidate_tags");
        let mut keys = self.registry.keys_for_tags(tags);
        keys.extend(ledger.in_flight_touching(tags));
        for key in &keys {
            self.invalidate_locked(&mut ledger, key);
        }
        keys
    }

    fn invalidate_locked(&self, ledger: &mut FetchLedger, key: &QueryKey) {
        ledger.bump(key);
        self.store.invalidate(key);
        self.registry.unregister(key);
        counter!(METRIC_INVALIDATE, "endpoint" => key.endpoint()).increment(1);
        debug!(query = %key, "Query invalidated");
    }

    /// Subscribe to `key`, loading it first if nothing is cached.
    pub async fn subscribe<T>(
        self: &Arc<Self>,
        key: QueryKey,
        project: fn(QueryValue) -> Option<T>,
    ) -> Subscription<T> {
        let receiver = self.subscriptions.subscribe(&key);
        let cached = if self.config.is_enabled() {
            self.store.get(&key)
        } else {
            None
        };
        match cached {
            Some(value) => self.subscriptions.publish(&key, &Ok(value)),
            // The outcome reaches the subscriber through its channel.
            None => {
                let _ = self.fetch(&key).await;
            }
        }
        Subscription::new(key, receiver, Arc::clone(self), project)
    }

    pub fn is_cached(&self, key: &QueryKey) -> bool {
        self.store.contains(key)
    }

    fn cache(&self, key: &QueryKey, value: QueryValue) {
        let tags = value.provided_tags(key);
        if let Some(evicted) = self.store.put(key, value) {
            self.registry.unregister(&evicted);
        }
        self.registry.register(key.clone(), tags);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Notify;

    use super::*;
    use crate::application::error::QueryErrorKind;
    use crate::cache::keys::Tag;
    use crate::domain::entities::Post;

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl QuerySource for CountingSource {
        async fn fetch(&self, key: &QueryKey) -> Result<QueryValue, QueryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(QueryError::new(QueryErrorKind::Transport, "offline"));
            }
            Ok(match key {
                QueryKey::ListPosts => QueryValue::Posts(vec![post(&format!("p{call}"))]),
                QueryKey::GetPost(id) => QueryValue::Post(Some(post(id))),
                QueryKey::ListComments(_) => QueryValue::Comments(Vec::new()),
            })
        }
    }

    fn post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            title: "Title".into(),
            content: "Some content".into(),
            author: "Ann".into(),
            created_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    fn runner(source: Arc<dyn QuerySource>, config: CacheConfig) -> Arc<QueryRunner> {
        Arc::new(QueryRunner::new(
            config.clone(),
            Arc::new(QueryStore::new(&config)),
            Arc::new(TagRegistry::new()),
            Arc::new(Subscriptions::new()),
            source,
        ))
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let source = CountingSource::new(false);
        let runner = runner(source.clone(), CacheConfig::default());

        let first = runner.read(&QueryKey::ListPosts).await.expect("read");
        let second = runner.read(&QueryKey::ListPosts).await.expect("read");

        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(runner.is_cached(&QueryKey::ListPosts));
    }

    #[tokio::test]
    async fn fetch_registers_provided_tags() {
        let source = CountingSource::new(false);
        let runner = runner(source, CacheConfig::default());

        runner.read(&QueryKey::ListPosts).await.expect("read");

        let keys = runner.registry.keys_for_tag(&Tag::post("p0"));
        assert!(keys.contains(&QueryKey::ListPosts));
    }

    #[tokio::test]
    async fn invalidate_forces_next_read_to_fetch() {
        let source = CountingSource::new(false);
        let runner = runner(source.clone(), CacheConfig::default());

        runner.read(&QueryKey::ListPosts).await.expect("read");
        runner.invalidate(&QueryKey::ListPosts);
        assert!(!runner.is_cached(&QueryKey::ListPosts));
        assert_eq!(runner.registry.key_count(), 0);

        runner.read(&QueryKey::ListPosts).await.expect("read");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_cache_always_fetches() {
        let source = CountingSource::new(false);
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let runner = runner(source.clone(), config);

        runner.read(&QueryKey::ListPosts).await.expect("read");
        runner.read(&QueryKey::ListPosts).await.expect("read");

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(!runner.is_cached(&QueryKey::ListPosts));
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let source = CountingSource::new(true);
        let runner = runner(source.clone(), CacheConfig::default());

        assert!(runner.read(&QueryKey::ListPosts).await.is_err());
        assert!(runner.read(&QueryKey::ListPosts).await.is_err());

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(!runner.is_cached(&QueryKey::ListPosts));
    }

    struct GatedSource {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl QuerySource for GatedSource {
        async fn fetch(&self, _key: &QueryKey) -> Result<QueryValue, QueryError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(QueryValue::Posts(vec![post("stale")]))
        }
    }

    #[tokio::test]
    async fn fetch_superseded_by_invalidation_is_not_cached() {
        let source = gated();
        let runner = runner(source.clone(), CacheConfig::default());

        let pending = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.fetch(&QueryKey::ListPosts).await })
        };
        source.entered.notified().await;
        runner.invalidate(&QueryKey::ListPosts);
        source.release.notify_one();

        let result = pending.await.expect("fetch task").expect("fetch");
        assert_eq!(result, QueryValue::Posts(vec![post("stale")]));
        assert!(!runner.is_cached(&QueryKey::ListPosts));
    }

    fn gated() -> Arc<GatedSource> {
        Arc::new(GatedSource {
            entered: Notify::new(),
            release: Notify::new(),
        })
    }

    #[tokio::test]
    async fn tag_invalidation_reaches_uncached_fetch_in_flight() {
        let source = gated();
        let runner = runner(source.clone(), CacheConfig::default());

        let pending = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.read(&QueryKey::ListPosts).await })
        };
        source.entered.notified().await;
        assert_eq!(runner.registry.key_count(), 0);

        let tags = HashSet::from([Tag::posts()]);
        let invalidated = runner.invalidate_tags(&tags);
        assert!(invalidated.contains(&QueryKey::ListPosts));
        source.release.notify_one();

        pending.await.expect("read task").expect("read");
        assert!(!runner.is_cached(&QueryKey::ListPosts));
        assert_eq!(runner.registry.key_count(), 0);
    }

    #[tokio::test]
    async fn single_post_tag_reaches_list_fetch_in_flight() {
        let source = gated();
        let runner = runner(source.clone(), CacheConfig::default());

        let pending = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.fetch(&QueryKey::ListPosts).await })
        };
        source.entered.notified().await;
        runner.invalidate_tags(&HashSet::from([Tag::post("stale")]));
        source.release.notify_one();

        pending.await.expect("fetch task").expect("fetch");
        assert!(!runner.is_cached(&QueryKey::ListPosts));
    }

    #[tokio::test]
    async fn unrelated_tags_leave_fetch_in_flight_alone() {
        let source = gated();
        let runner = runner(source.clone(), CacheConfig::default());

        let pending = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.fetch(&QueryKey::ListPosts).await })
        };
        source.entered.notified().await;
        let invalidated = runner.invalidate_tags(&HashSet::from([Tag::comments("p1")]));
        assert!(invalidated.is_empty());
        source.release.notify_one();

        pending.await.expect("fetch task").expect("fetch");
        assert!(runner.is_cached(&QueryKey::ListPosts));
    }

    #[tokio::test]
    async fn subscribe_loads_and_publishes() {
        let source = CountingSource::new(false);
        let runner = runner(source, CacheConfig::default());

        let subscription = runner
            .subscribe(QueryKey::GetPost("a".into()), |value| match value {
                QueryValue::Post(post) => Some(post),
                _ => None,
            })
            .await;

        let state = subscription.state();
        assert!(!state.is_loading);
        assert_eq!(state.data, Some(Some(post("a"))));
        assert!(runner.subscriptions.is_active(&QueryKey::GetPost("a".into())));
    }
}
