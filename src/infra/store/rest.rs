//! Document store reached over a JSON/HTTP document service.
//!
//! Routes, relative to the configured base URL:
//!
//! - `GET {collection}` and `GET {collection}?{field}={value}` list records
//! - `GET {collection}/{id}` reads one record, 404 meaning absent
//! - `POST {collection}` creates a record and answers `{"id": "..."}`
//! - `PATCH {collection}/{id}` merges fields
//! - `DELETE {collection}/{id}` removes a record, 404 counting as success

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::application::repos::{Document, DocumentStore, StoreError};
use crate::domain::entities::Collection;
use crate::infra::error::InfraError;

#[derive(Debug, Deserialize)]
struct CreatedId {
    id: String,
}

#[derive(Clone, Debug)]
pub struct RestDocumentStore {
    client: Client,
    base: Url,
}

impl RestDocumentStore {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, InfraError> {
        if base.cannot_be_a_base() {
            return Err(InfraError::configuration(format!(
                "store base url `{base}` cannot carry a path"
            )));
        }
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::store_client(err.to_string()))?;
        Ok(Self { client, base })
    }

    pub fn user_agent() -> &'static str {
        concat!("folio/", env!("CARGO_PKG_VERSION"))
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::Transport(format!("invalid base url `{}`", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, StoreError> {
        request.send().await.map_err(StoreError::transport)
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn read_json<T>(response: Response) -> Result<T, StoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        let bytes = response.bytes().await.map_err(StoreError::transport)?;
        serde_json::from_slice(&bytes).map_err(|err| StoreError::Decode(err.to_string()))
    }
}

/// Split a JSON record into its id and remaining fields.
fn into_document(mut fields: Map<String, Value>) -> Result<Document, StoreError> {
    let id = match fields.remove("id") {
        Some(Value::String(id)) => id,
        Some(Value::Number(id)) => id.to_string(),
        Some(other) => {
            return Err(StoreError::Decode(format!("record id must be a string, got {other}")));
        }
        None => return Err(StoreError::Decode("record has no id".to_string())),
    };
    Ok(Document::new(id, fields))
}

fn into_documents(records: Vec<Map<String, Value>>) -> Result<Vec<Document>, StoreError> {
    records.into_iter().map(into_document).collect()
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn list_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let url = self.url(&[collection.as_str()])?;
        let response = Self::check(self.send(self.client.get(url)).await?).await?;
        into_documents(Self::read_json(response).await?)
    }

    async fn get_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let url = self.url(&[collection.as_str(), id])?;
        let response = self.send(self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        let mut fields: Map<String, Value> = Self::read_json(response).await?;
        fields.insert("id".to_string(), Value::String(id.to_string()));
        into_document(fields).map(Some)
    }

    async fn list_where(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, StoreError> {
        let mut url = self.url(&[collection.as_str()])?;
        url.query_pairs_mut().append_pair(field, value);
        let response = Self::check(self.send(self.client.get(url)).await?).await?;
        into_documents(Self::read_json(response).await?)
    }

    async fn create(
        &self,
        collection: Collection,
        fields: Map<String, Value>,
    ) -> Result<String, StoreError> {
        let url = self.url(&[collection.as_str()])?;
        let response = Self::check(self.send(self.client.post(url).json(&fields)).await?).await?;
        let created: CreatedId = Self::read_json(response).await?;
        debug!(collection = %collection, id = %created.id, "Document created");
        Ok(created.id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let url = self.url(&[collection.as_str(), id])?;
        let response = self.send(self.client.patch(url).json(&fields)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            });
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let url = self.url(&[collection.as_str(), id])?;
        let response = self.send(self.client.delete(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(collection = %collection, id = %id, "Delete of absent document");
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }
}
