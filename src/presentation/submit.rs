//! Form submission flows: validate, then mutate.
//!
//! Forms are borrowed so a failed submission leaves them intact for retry.

use thiserror::Error;

use crate::application::blog::{BlogApi, Deleted};
use crate::application::error::QueryError;
use crate::domain::forms::{CommentForm, FormErrors, PostForm, PostPatch, ValidationPolicy};

use super::notify::{Notification, Operation, report_mutation_failure};

#[derive(Debug, Error)]
pub enum SubmitError {
    /// Validation failed; no mutation was attempted.
    #[error("{0}")]
    Invalid(FormErrors),
    /// The mutation failed after validation passed.
    #[error("{}", .notification.message)]
    Failed {
        notification: Notification,
        #[source]
        error: QueryError,
    },
}

impl SubmitError {
    fn failed(operation: Operation, entity_id: &str, error: QueryError) -> Self {
        let notification = report_mutation_failure(operation, entity_id, &error);
        Self::Failed {
            notification,
            error,
        }
    }
}

pub async fn submit_post(
    api: &BlogApi,
    policy: &ValidationPolicy,
    form: &PostForm,
) -> Result<String, SubmitError> {
    let input = form.validate(policy).map_err(SubmitError::Invalid)?;
    api.create_post(input)
        .await
        .map_err(|err| SubmitError::failed(Operation::CreatePost, "", err))
}

pub async fn submit_post_update(
    api: &BlogApi,
    policy: &ValidationPolicy,
    id: &str,
    patch: &PostPatch,
) -> Result<(), SubmitError> {
    patch.validate(policy).map_err(SubmitError::Invalid)?;
    api.update_post(id, patch.clone())
        .await
        .map_err(|err| SubmitError::failed(Operation::UpdatePost, id, err))
}

pub async fn submit_comment(
    api: &BlogApi,
    policy: &ValidationPolicy,
    post_id: &str,
    form: &CommentForm,
) -> Result<String, SubmitError> {
    let input = form.validate(policy).map_err(SubmitError::Invalid)?;
    api.create_comment(post_id, input)
        .await
        .map_err(|err| SubmitError::failed(Operation::CreateComment, post_id, err))
}

pub async fn remove_post(api: &BlogApi, id: &str) -> Result<Deleted, SubmitError> {
    api.delete_post(id)
        .await
        .map_err(|err| SubmitError::failed(Operation::DeletePost, id, err))
}

pub async fn remove_comment(
    api: &BlogApi,
    post_id: &str,
    comment_id: &str,
) -> Result<Deleted, SubmitError> {
    api.delete_comment(post_id, comment_id)
        .await
        .map_err(|err| SubmitError::failed(Operation::DeleteComment, comment_id, err))
}
