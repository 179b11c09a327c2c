//! User-facing notifications for failed mutations.
//!
//! The user sees a short [`Notification`]; operators get a structured
//! `tracing` event with the error code and the span trace it was raised in.

use metrics::counter;
use serde::Serialize;
use tracing::error;
use tracing_error::SpanTrace;

use crate::application::error::QueryError;

const METRIC_MUTATION_FAILURE: &str = "folio_mutation_failure_total";
const UNKNOWN_ERROR: &str = "Unknown error";
const NO_CODE: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreatePost,
    UpdatePost,
    DeletePost,
    CreateComment,
    DeleteComment,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::CreatePost => "createPost",
            Operation::UpdatePost => "updatePost",
            Operation::DeletePost => "deletePost",
            Operation::CreateComment => "createComment",
            Operation::DeleteComment => "deleteComment",
        }
    }

    pub fn failure_title(self) -> &'static str {
        match self {
            Operation::CreatePost => "Failed to create post",
            Operation::UpdatePost => "Failed to update post",
            Operation::DeletePost => "Failed to delete post",
            Operation::CreateComment => "Failed to add comment",
            Operation::DeleteComment => "Failed to delete comment",
        }
    }
}

/// Blocking notice shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn failure(operation: Operation, error: &QueryError) -> Self {
        let cause = match error.message() {
            "" => UNKNOWN_ERROR,
            message => message,
        };
        Self {
            title: operation.failure_title().to_string(),
            message: format!("{}: {cause}", operation.failure_title()),
        }
    }
}

/// Log a failed mutation for operators and build the notice for the user.
pub fn report_mutation_failure(
    operation: Operation,
    entity_id: &str,
    error: &QueryError,
) -> Notification {
    let stack = SpanTrace::capture();
    counter!(METRIC_MUTATION_FAILURE, "operation" => operation.as_str()).increment(1);
    error!(
        operation = operation.as_str(),
        entity_id = entity_id,
        code = error.code.as_deref().unwrap_or(NO_CODE),
        kind = ?error.kind,
        stack = %stack,
        "{}",
        error.message()
    );
    Notification::failure(operation, error)
}
