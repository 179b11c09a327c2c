//! Process-local document store.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::application::repos::{Document, DocumentStore, StoreError};
use crate::domain::entities::Collection;

#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    fields: Map<String, Value>,
}

/// Collections held in `DashMap`s; listing follows insertion order.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    posts: DashMap<String, StoredDocument>,
    comments: DashMap<String, StoredDocument>,
    next_seq: AtomicU64,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, collection: Collection) -> &DashMap<String, StoredDocument> {
        match collection {
            Collection::Posts => &self.posts,
            Collection::Comments => &self.comments,
        }
    }

    /// Store `fields` under a caller-chosen id, replacing any existing record.
    pub fn insert(
        &self,
        collection: Collection,
        id: impl Into<String>,
        fields: Map<String, Value>,
    ) {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let document = StoredDocument {
            seq,
            fields: strip_id(fields),
        };
        self.table(collection).insert(id.into(), document);
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.table(collection).len()
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.table(collection).is_empty()
    }

    fn collect_sorted(
        &self,
        collection: Collection,
        predicate: impl Fn(&StoredDocument) -> bool,
    ) -> Vec<Document> {
        let mut rows: Vec<(u64, Document)> = self
            .table(collection)
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| {
                (
                    entry.value().seq,
                    Document::new(entry.key().clone(), entry.value().fields.clone()),
                )
            })
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, document)| document).collect()
    }
}

fn strip_id(mut fields: Map<String, Value>) -> Map<String, Value> {
    fields.remove("id");
    fields
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        Ok(self.collect_sorted(collection, |_| true))
    }

    async fn get_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self
            .table(collection)
            .get(id)
            .map(|entry| Document::new(id, entry.fields.clone())))
    }

    async fn list_where(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self.collect_sorted(collection, |stored| {
            stored.fields.get(field).and_then(Value::as_str) == Some(value)
        }))
    }

    async fn create(
        &self,
        collection: Collection,
        fields: Map<String, Value>,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        self.insert(collection, id.clone(), fields);
        debug!(collection = %collection, id = %id, "Document created");
        Ok(id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .table(collection)
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })?;
        entry.fields.extend(strip_id(fields));
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        if self.table(collection).remove(id).is_none() {
            debug!(collection = %collection, id = %id, "Delete of absent document");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn list_all_preserves_insertion_order() {
        let store = InMemoryDocumentStore::new();
        let first = store
            .create(Collection::Posts, fields(json!({"title": "a"})))
            .await
            .expect("create a");
        let second = store
            .create(Collection::Posts, fields(json!({"title": "b"})))
            .await
            .expect("create b");

        let ids: Vec<String> = store
            .list_all(Collection::Posts)
            .await
            .expect("list")
            .into_iter()
            .map(|doc| doc.id)
            .collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = InMemoryDocumentStore::new();
        let found = store.get_by_id(Collection::Posts, "nope").await.expect("get");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn list_where_matches_string_field() {
        let store = InMemoryDocumentStore::new();
        store.insert(Collection::Comments, "c1", fields(json!({"postId": "p1"})));
        store.insert(Collection::Comments, "c2", fields(json!({"postId": "p2"})));
        store.insert(Collection::Comments, "c3", fields(json!({"postId": "p1"})));

        let docs = store
            .list_where(Collection::Comments, "postId", "p1")
            .await
            .expect("list_where");
        let ids: Vec<&str> = docs.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = InMemoryDocumentStore::new();
        store.insert(
            Collection::Posts,
            "p1",
            fields(json!({"title": "old", "author": "Ann"})),
        );

        store
            .update(Collection::Posts, "p1", fields(json!({"title": "new"})))
            .await
            .expect("update");

        let doc = store
            .get_by_id(Collection::Posts, "p1")
            .await
            .expect("get")
            .expect("present");
        assert_eq!(doc.fields["title"], "new");
        assert_eq!(doc.fields["author"], "Ann");
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = store
            .update(Collection::Posts, "p1", Map::new())
            .await
            .expect_err("should fail");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryDocumentStore::new();
        store.insert(Collection::Posts, "p1", Map::new());
        store.delete(Collection::Posts, "p1").await.expect("delete");
        store.delete(Collection::Posts, "p1").await.expect("delete again");
        assert!(store.is_empty(Collection::Posts));
    }

    #[tokio::test]
    async fn stored_fields_never_carry_id() {
        let store = InMemoryDocumentStore::new();
        let id = store
            .create(Collection::Posts, fields(json!({"id": "forged", "title": "t"})))
            .await
            .expect("create");
        let doc = store
            .get_by_id(Collection::Posts, &id)
            .await
            .expect("get")
            .expect("present");
        assert!(!doc.fields.contains_key("id"));
        assert_ne!(id, "forged");
    }
}
