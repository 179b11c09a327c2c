//! In-memory storage for query results.
//!
//! The post list is a singleton; single posts and comment lists are keyed by
//! id and bounded with LRU eviction.

use std::collections::HashSet;
use std::sync::RwLock;

use lru::LruCache;
use metrics::counter;
use tracing::warn;

use crate::domain::entities::{Comment, Post};

use super::config::CacheConfig;
use super::keys::{QueryKey, Tag};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";
const METRIC_EVICT: &str = "folio_query_cache_evict_total";

/// Result of one query, as cached and as published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Posts(Vec<Post>),
    Post(Option<Post>),
    Comments(Vec<Comment>),
}

impl QueryValue {
    /// Tags this result provides when cached under `key`.
    ///
    /// The post list also provides `Posts:{id}` for each post it contains so
    /// an update to one post refreshes lists showing it.
    pub fn provided_tags(&self, key: &QueryKey) -> HashSet<Tag> {
        let mut tags = HashSet::new();
        match (key, self) {
            (QueryKey::ListPosts, QueryValue::Posts(posts)) => {
                tags.insert(Tag::posts());
                tags.extend(posts.iter().map(|post| Tag::post(post.id.clone())));
            }
            (QueryKey::GetPost(id), _) => {
                tags.insert(Tag::post(id.clone()));
            }
            (QueryKey::ListComments(post_id), _) => {
                tags.insert(Tag::comments(post_id.clone()));
            }
            (QueryKey::ListPosts, _) => {
                tags.insert(Tag::posts());
            }
        }
        tags
    }

    fn matches(&self, key: &QueryKey) -> bool {
        matches!(
            (key, self),
            (QueryKey::ListPosts, QueryValue::Posts(_))
                | (QueryKey::GetPost(_), QueryValue::Post(_))
                | (QueryKey::ListComments(_), QueryValue::Comments(_))
        )
    }
}

pub struct QueryStore {
    post_list: RwLock<Option<Vec<Post>>>,
    posts_by_id: RwLock<LruCache<String, Option<Post>>>,
    comments_by_post: RwLock<LruCache<String, Vec<Comment>>>,
}

impl QueryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            post_list: RwLock::new(None),
            posts_by_id: RwLock::new(LruCache::new(config.post_limit_non_zero())),
            comments_by_post: RwLock::new(LruCache::new(config.comment_list_limit_non_zero())),
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<QueryValue> {
        match key {
            QueryKey::ListPosts => rw_read(&self.post_list, SOURCE, "get.post_list")
                .clone()
                .map(QueryValue::Posts),
            QueryKey::GetPost(id) => rw_write(&self.posts_by_id, SOURCE, "get.posts_by_id")
                .get(id)
                .cloned()
                .map(QueryValue::Post),
            QueryKey::ListComments(post_id) => {
                rw_write(&self.comments_by_post, SOURCE, "get.comments_by_post")
                    .get(post_id)
                    .cloned()
                    .map(QueryValue::Comments)
            }
        }
    }

    /// Store `value` under `key`. Returns the key evicted to make room, if any.
    pub fn put(&self, key: &QueryKey, value: QueryValue) -> Option<QueryKey> {
        if !value.matches(key) {
            warn!(query = %key, "Refusing to cache a value of the wrong shape");
            return None;
        }

        let evicted = match (key, value) {
            (QueryKey::ListPosts, QueryValue::Posts(posts)) => {
                *rw_write(&self.post_list, SOURCE, "put.post_list") = Some(posts);
                None
            }
            (QueryKey::GetPost(id), QueryValue::Post(post)) => {
                rw_write(&self.posts_by_id, SOURCE, "put.posts_by_id")
                    .push(id.clone(), post)
                    .filter(|(evicted, _)| evicted != id)
                    .map(|(evicted, _)| QueryKey::GetPost(evicted))
            }
            (QueryKey::ListComments(post_id), QueryValue::Comments(comments)) => {
                rw_write(&self.comments_by_post, SOURCE, "put.comments_by_post")
                    .push(post_id.clone(), comments)
                    .filter(|(evicted, _)| evicted != post_id)
                    .map(|(evicted, _)| QueryKey::ListComments(evicted))
            }
            _ => None,
        };

        if let Some(evicted) = &evicted {
            counter!(METRIC_EVICT, "endpoint" => evicted.endpoint()).increment(1);
        }
        evicted
    }

    pub fn invalidate(&self, key: &QueryKey) {
        match key {
            QueryKey::ListPosts => {
                *rw_write(&self.post_list, SOURCE, "invalidate.post_list") = None;
            }
            QueryKey::GetPost(id) => {
                rw_write(&self.posts_by_id, SOURCE, "invalidate.posts_by_id").pop(id);
            }
            QueryKey::ListComments(post_id) => {
                rw_write(&self.comments_by_post, SOURCE, "invalidate.comments_by_post")
                    .pop(post_id);
            }
        }
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        match key {
            QueryKey::ListPosts => rw_read(&self.post_list, SOURCE, "contains.post_list").is_some(),
            QueryKey::GetPost(id) => {
                rw_read(&self.posts_by_id, SOURCE, "contains.posts_by_id").contains(id)
            }
            QueryKey::ListComments(post_id) => {
                rw_read(&self.comments_by_post, SOURCE, "contains.comments_by_post")
                    .contains(post_id)
            }
        }
    }

    pub fn clear(&self) {
        *rw_write(&self.post_list, SOURCE, "clear.post_list") = None;
        rw_write(&self.posts_by_id, SOURCE, "clear.posts_by_id").clear();
        rw_write(&self.comments_by_post, SOURCE, "clear.comments_by_post").clear();
    }

    /// Number of cached query results.
    pub fn len(&self) -> usize {
        let list = usize::from(rw_read(&self.post_list, SOURCE, "len.post_list").is_some());
        list + rw_read(&self.posts_by_id, SOURCE, "len.posts_by_id").len()
            + rw_read(&self.comments_by_post, SOURCE, "len.comments_by_post").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
