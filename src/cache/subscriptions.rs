//! Live query subscriptions.
//!
//! Each subscribed query has a `watch` channel carrying its latest state.
//! A query counts as displayed while at least one receiver is alive.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::application::error::{QueryError, QueryErrorKind};

use super::keys::QueryKey;
use super::lock::mutex_lock;
use super::runner::QueryRunner;
use super::store::QueryValue;

const SOURCE: &str = "cache::subscriptions";

/// What a view reads for one query: `{ data, isLoading, error }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<QueryError>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
        }
    }
}

impl<T> QueryState<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> Option<U>) -> QueryState<U> {
        QueryState {
            data: self.data.and_then(f),
            is_loading: self.is_loading,
            error: self.error,
        }
    }
}

pub struct Subscriptions {
    channels: Mutex<HashMap<QueryKey, watch::Sender<QueryState<QueryValue>>>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<QueryState<QueryValue>> {
        mutex_lock(&self.channels, SOURCE, "subscribe")
            .entry(key.clone())
            .or_insert_with(|| watch::channel(QueryState::default()).0)
            .subscribe()
    }

    pub fn is_active(&self, key: &QueryKey) -> bool {
        mutex_lock(&self.channels, SOURCE, "is_active")
            .get(key)
            .is_some_and(|sender| sender.receiver_count() > 0)
    }

    pub fn active_keys(&self) -> Vec<QueryKey> {
        mutex_lock(&self.channels, SOURCE, "active_keys")
            .iter()
            .filter(|(_, sender)| sender.receiver_count() > 0)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn mark_loading(&self, key: &QueryKey) {
        if let Some(sender) = mutex_lock(&self.channels, SOURCE, "mark_loading").get(key) {
            sender.send_modify(|state| state.is_loading = true);
        }
    }

    /// Publish a finished fetch. A failure keeps the previous data visible.
    pub fn publish(&self, key: &QueryKey, result: &Result<QueryValue, QueryError>) {
        let channels = mutex_lock(&self.channels, SOURCE, "publish");
        let Some(sender) = channels.get(key) else {
            return;
        };
        sender.send_modify(|state| {
            state.is_loading = false;
            match result {
                Ok(value) => {
                    state.data = Some(value.clone());
                    state.error = None;
                }
                Err(err) => state.error = Some(err.clone()),
            }
        });
    }

    /// Drop channels nobody listens to any more.
    pub fn prune(&self) {
        mutex_lock(&self.channels, SOURCE, "prune").retain(|_, sender| sender.receiver_count() > 0);
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.channels, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Subscriptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Typed handle on one subscribed query. Dropping it unsubscribes.
pub struct Subscription<T> {
    key: QueryKey,
    receiver: watch::Receiver<QueryState<QueryValue>>,
    runner: Arc<QueryRunner>,
    project: fn(QueryValue) -> Option<T>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(
        key: QueryKey,
        receiver: watch::Receiver<QueryState<QueryValue>>,
        runner: Arc<QueryRunner>,
        project: fn(QueryValue) -> Option<T>,
    ) -> Self {
        Self {
            key,
            receiver,
            runner,
            project,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Latest published state.
    pub fn state(&self) -> QueryState<T> {
        self.receiver.borrow().clone().map(self.project)
    }

    /// Wait for the next published state. Returns false once the cache is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Fetch from the store regardless of the cache.
    pub async fn refetch(&self) -> Result<T, QueryError> {
        let value = self.runner.fetch(&self.key).await?;
        (self.project)(value).ok_or_else(|| {
            QueryError::new(
                QueryErrorKind::Decode,
                format!("unexpected result shape for {}", self.key),
            )
        })
    }
}
