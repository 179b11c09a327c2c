use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::{ErrorReport, ErrorStatus, QueryError};
use crate::domain::forms::FormErrors;
use crate::presentation::notify::Notification;
use crate::presentation::submit::SubmitError;

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFIRMATION_REQUIRED: &str = "confirmation_required";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Failed query or mutation: `{ status, error, message }`.
#[derive(Debug, Serialize)]
pub struct UpstreamErrorBody {
    pub status: ErrorStatus,
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Status {
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    },
    Invalid(FormErrors),
    Upstream {
        error: QueryError,
        message: String,
    },
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self::Status {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn confirmation_required() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::CONFIRMATION_REQUIRED,
            "Deleting a post cannot be undone",
            Some("repeat the request with confirm=true".to_string()),
        )
    }

    /// A query failed while building a view.
    pub fn query(message: &str, error: QueryError) -> Self {
        Self::Upstream {
            message: format!("{message}: {}", error.message()),
            error,
        }
    }

    /// A mutation failed; `notification` was already reported.
    pub fn mutation(notification: Notification, error: QueryError) -> Self {
        Self::Upstream {
            error,
            message: notification.message,
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Invalid(errors) => Self::Invalid(errors),
            SubmitError::Failed {
                notification,
                error,
            } => Self::mutation(notification, error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Status {
                status,
                code,
                message,
                hint,
            } => {
                let detail = format!("{code}: {}", hint.as_deref().unwrap_or(message));
                let body = ApiErrorBody {
                    error: ApiErrorMessage {
                        code: code.to_string(),
                        message: message.to_string(),
                        hint,
                    },
                };
                let mut response = (status, Json(body)).into_response();
                // Read back by `log_responses`.
                ErrorReport::from_message("infra::http", status, detail).attach(&mut response);
                response
            }
            ApiError::Invalid(errors) => {
                let status = StatusCode::UNPROCESSABLE_ENTITY;
                let mut response = (status, Json(&errors)).into_response();
                ErrorReport::from_error("infra::http::validation", status, &errors)
                    .attach(&mut response);
                response
            }
            ApiError::Upstream { error, message } => {
                let status = StatusCode::BAD_GATEWAY;
                let report = ErrorReport::from_error("infra::http::store", status, &error);
                let body = UpstreamErrorBody {
                    status: error.status,
                    error: error.error,
                    message,
                };
                let mut response = (status, Json(body)).into_response();
                report.attach(&mut response);
                response
            }
        }
    }
}
