use thiserror::Error;

use super::entities::Collection;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("record `{id}` in `{collection}` is malformed: {message}")]
    MalformedRecord {
        collection: Collection,
        id: String,
        message: String,
    },
}

impl DomainError {
    pub fn malformed(
        collection: Collection,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedRecord {
            collection,
            id: id.into(),
            message: message.into(),
        }
    }
}
