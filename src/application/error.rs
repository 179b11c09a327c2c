use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use serde::Serialize;
use thiserror::Error;

use crate::application::repos::StoreError;
use crate::config::LoadError;
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

/// Diagnostic chain attached to HTTP responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Wire status of a failed query or mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorStatus {
    #[serde(rename = "FETCH_ERROR")]
    FetchError,
}

/// What went wrong, for diagnostics. Callers see the same shape for all kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    Transport,
    Store,
    Decode,
    Precondition,
}

/// Normalized failure of a query or mutation: `{ "status": "FETCH_ERROR", "error": message }`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{error}")]
pub struct QueryError {
    pub status: ErrorStatus,
    pub error: String,
    #[serde(skip)]
    pub kind: QueryErrorKind,
    #[serde(skip)]
    pub code: Option<String>,
}

impl QueryError {
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: ErrorStatus::FetchError,
            error: message.into(),
            kind,
            code: None,
        }
    }

    /// A local check failed before any store call was made.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::Precondition, message).with_code("precondition")
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.error
    }
}

impl From<StoreError> for QueryError {
    fn from(error: StoreError) -> Self {
        let kind = match &error {
            StoreError::Transport(_) => QueryErrorKind::Transport,
            StoreError::Decode(_) => QueryErrorKind::Decode,
            StoreError::Status { .. } | StoreError::NotFound { .. } | StoreError::Encode(_) => {
                QueryErrorKind::Store
            }
        };
        let code = error.code();
        QueryError::new(kind, error.to_string()).with_code(code)
    }
}

impl From<DomainError> for QueryError {
    fn from(error: DomainError) -> Self {
        QueryError::new(QueryErrorKind::Decode, error.to_string()).with_code("malformed")
    }
}

/// Process-level failure surfaced by the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] LoadError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Collection;

    #[test]
    fn query_error_serializes_fetch_error_shape() {
        let err = QueryError::new(QueryErrorKind::Transport, "connection refused");
        let value = serde_json::to_value(&err).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({ "status": "FETCH_ERROR", "error": "connection refused" })
        );
    }

    #[test]
    fn precondition_has_same_wire_shape() {
        let err = QueryError::precondition("Comment ID is missing");
        let value = serde_json::to_value(&err).expect("serialize");
        assert_eq!(value["status"], "FETCH_ERROR");
        assert_eq!(err.kind, QueryErrorKind::Precondition);
    }

    #[test]
    fn store_errors_keep_their_code() {
        let err: QueryError = StoreError::NotFound {
            collection: Collection::Posts,
            id: "p1".to_string(),
        }
        .into();
        assert_eq!(err.kind, QueryErrorKind::Store);
        assert_eq!(err.code.as_deref(), Some("not_found"));
        assert!(err.message().contains("p1"));
    }

    #[test]
    fn error_report_collects_source_chain() {
        let err = AppError::Infra(InfraError::configuration("bad value"));
        let report = ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &err);
        assert_eq!(
            report.messages.first().map(String::as_str),
            Some("configuration error: bad value")
        );
    }
}
