//! Document store contract used by the query layer.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::entities::Collection;
use crate::domain::error::DomainError;

/// Untyped record as moved across the store boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Decode into a typed record; the document id overrides any `id` field.
    pub fn decode<T: DeserializeOwned>(self, collection: Collection) -> Result<T, DomainError> {
        let Document { id, mut fields } = self;
        fields.insert("id".to_string(), Value::String(id.clone()));
        serde_json::from_value(Value::Object(fields))
            .map_err(|err| DomainError::malformed(collection, id, err.to_string()))
    }
}

/// Serialize a struct into the field map the store expects.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Encode(format!(
            "expected an object, got {other}"
        ))),
        Err(err) => Err(StoreError::Encode(err.to_string())),
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("store responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("record `{id}` not found in `{collection}`")]
    NotFound { collection: Collection, id: String },
    #[error("invalid store response: {0}")]
    Decode(String),
    #[error("could not encode record: {0}")]
    Encode(String),
}

impl StoreError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Short machine-readable code for diagnostics.
    pub fn code(&self) -> String {
        match self {
            StoreError::Transport(_) => "transport".to_string(),
            StoreError::Status { status, .. } => format!("status_{status}"),
            StoreError::NotFound { .. } => "not_found".to_string(),
            StoreError::Decode(_) => "decode".to_string(),
            StoreError::Encode(_) => "encode".to_string(),
        }
    }
}

/// CRUD access to the external document store.
///
/// Every call is a round trip to the store; implementations keep no durable
/// local state of their own.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every record of the collection, in store-native order.
    async fn list_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError>;

    /// `Ok(None)` when no record has this id.
    async fn get_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, StoreError>;

    /// Records whose `field` equals `value`.
    async fn list_where(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, StoreError>;

    /// Insert a record and return the id the store assigned.
    async fn create(
        &self,
        collection: Collection,
        fields: Map<String, Value>,
    ) -> Result<String, StoreError>;

    /// Merge `fields` into an existing record. Fails with `NotFound` when absent.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Remove a record. Removing an absent record succeeds.
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::entities::Post;

    #[test]
    fn decode_injects_document_id() {
        let fields = to_fields(&json!({
            "id": "ignored",
            "title": "T",
            "content": "C",
            "author": "A",
            "createdAt": "2024-01-01T00:00:00Z",
        }))
        .expect("fields");
        let post: Post = Document::new("real", fields)
            .decode(Collection::Posts)
            .expect("decode");
        assert_eq!(post.id, "real");
    }

    #[test]
    fn decode_reports_missing_fields() {
        let fields = to_fields(&json!({ "title": "T" })).expect("fields");
        let err = Document::new("p1", fields)
            .decode::<Post>(Collection::Posts)
            .expect_err("missing fields");
        assert!(matches!(err, DomainError::MalformedRecord { ref id, .. } if id == "p1"));
    }

    #[test]
    fn to_fields_rejects_non_objects() {
        assert!(matches!(to_fields(&json!([1, 2])), Err(StoreError::Encode(_))));
    }

    #[test]
    fn status_code_is_exposed() {
        let err = StoreError::Status {
            status: 503,
            body: String::new(),
        };
        assert_eq!(err.code(), "status_503");
    }
}
