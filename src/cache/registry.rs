//! Bidirectional tag registry.
//!
//! Tracks which cached queries provided which tags so a mutation's
//! invalidated tags can be resolved to the queries that must be dropped.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::keys::{QueryKey, Tag};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::registry";

/// Tracks tag → query keys and query key → tags.
pub struct TagRegistry {
    tag_to_keys: RwLock<HashMap<Tag, HashSet<QueryKey>>>,
    key_to_tags: RwLock<HashMap<QueryKey, HashSet<Tag>>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self {
            tag_to_keys: RwLock::new(HashMap::new()),
            key_to_tags: RwLock::new(HashMap::new()),
        }
    }

    /// Record the tags a freshly cached query provides, replacing any tags
    /// it provided before.
    pub fn register(&self, key: QueryKey, tags: HashSet<Tag>) {
        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "register.tag_to_keys");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "register.key_to_tags");

        if let Some(previous) = k2t.remove(&key) {
            detach(&mut t2k, &key, previous);
        }
        for tag in &tags {
            t2k.entry(tag.clone()).or_default().insert(key.clone());
        }
        k2t.insert(key, tags);
    }

    /// Every registered query whose provided tags are covered by `tag`.
    pub fn keys_for_tag(&self, tag: &Tag) -> HashSet<QueryKey> {
        let t2k = rw_read(&self.tag_to_keys, SOURCE, "keys_for_tag");
        if tag.id.is_some() {
            return t2k.get(tag).cloned().unwrap_or_default();
        }
        t2k.iter()
            .filter(|(provided, _)| tag.covers(provided))
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    /// Union of `keys_for_tag` over all `tags`.
    pub fn keys_for_tags<'a>(&self, tags: impl IntoIterator<Item = &'a Tag>) -> HashSet<QueryKey> {
        tags.into_iter()
            .flat_map(|tag| self.keys_for_tag(tag))
            .collect()
    }

    pub fn tags_for_key(&self, key: &QueryKey) -> HashSet<Tag> {
        rw_read(&self.key_to_tags, SOURCE, "tags_for_key")
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Forget a query, e.g. after invalidation or LRU eviction.
    pub fn unregister(&self, key: &QueryKey) {
        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "unregister.tag_to_keys");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "unregister.key_to_tags");

        if let Some(tags) = k2t.remove(key) {
            detach(&mut t2k, key, tags);
        }
    }

    pub fn clear(&self) {
        rw_write(&self.tag_to_keys, SOURCE, "clear.tag_to_keys").clear();
        rw_write(&self.key_to_tags, SOURCE, "clear.key_to_tags").clear();
    }

    pub fn tag_count(&self) -> usize {
        rw_read(&self.tag_to_keys, SOURCE, "tag_count").len()
    }

    pub fn key_count(&self) -> usize {
        rw_read(&self.key_to_tags, SOURCE, "key_count").len()
    }
}

fn detach(t2k: &mut HashMap<Tag, HashSet<QueryKey>>, key: &QueryKey, tags: HashSet<Tag>) {
    for tag in tags {
        if let Some(keys) = t2k.get_mut(&tag) {
            keys.remove(key);
            if keys.is_empty() {
                t2k.remove(&tag);
            }
        }
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}
