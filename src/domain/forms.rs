//! Declarative validation for the create-post and add-comment forms.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entities::{NewComment, NewPost};

const DEFAULT_POST_TITLE_MIN: usize = 3;
const DEFAULT_POST_TITLE_MAX: usize = 100;
const DEFAULT_POST_CONTENT_MIN: usize = 10;
const DEFAULT_POST_AUTHOR_MIN: usize = 2;
const DEFAULT_COMMENT_TEXT_MIN: usize = 1;
const DEFAULT_COMMENT_AUTHOR_MIN: usize = 2;

/// Length rules for both forms. Lengths count Unicode scalar values and
/// input is not trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub post_title_min: usize,
    pub post_title_max: usize,
    pub post_content_min: usize,
    pub post_author_min: usize,
    pub comment_text_min: usize,
    pub comment_author_min: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            post_title_min: DEFAULT_POST_TITLE_MIN,
            post_title_max: DEFAULT_POST_TITLE_MAX,
            post_content_min: DEFAULT_POST_CONTENT_MIN,
            post_author_min: DEFAULT_POST_AUTHOR_MIN,
            comment_text_min: DEFAULT_COMMENT_TEXT_MIN,
            comment_author_min: DEFAULT_COMMENT_AUTHOR_MIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every failing field of one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    pub errors: Vec<FieldError>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|error| error.field == field)
    }

    fn push(&mut self, field: &'static str, message: String) {
        self.errors.push(FieldError { field, message });
    }

    fn min_len(&mut self, field: &'static str, label: &str, value: &str, min: usize) {
        if value.chars().count() < min {
            let message = if min <= 1 {
                format!("{label} must not be empty")
            } else {
                format!("{label} must be at least {min} characters")
            };
            self.push(field, message);
        }
    }

    fn max_len(&mut self, field: &'static str, label: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.push(field, format!("{label} must be at most {max} characters"));
        }
    }

    fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for FormErrors {}

/// Raw create-post form input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PostForm {
    pub title: String,
    pub content: String,
    pub author: String,
}

impl PostForm {
    pub fn validate(&self, policy: &ValidationPolicy) -> Result<NewPost, FormErrors> {
        let mut errors = FormErrors::default();
        check_title(&mut errors, &self.title, policy);
        errors.min_len("content", "Content", &self.content, policy.post_content_min);
        errors.min_len("author", "Author name", &self.author, policy.post_author_min);
        errors.into_result(NewPost {
            title: self.title.clone(),
            content: self.content.clone(),
            author: self.author.clone(),
        })
    }
}

/// Partial post update; absent fields are left untouched in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl PostPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.author.is_none()
    }

    /// Apply the post rules to the fields that are present.
    pub fn validate(&self, policy: &ValidationPolicy) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        if let Some(title) = &self.title {
            check_title(&mut errors, title, policy);
        }
        if let Some(content) = &self.content {
            errors.min_len("content", "Content", content, policy.post_content_min);
        }
        if let Some(author) = &self.author {
            errors.min_len("author", "Author name", author, policy.post_author_min);
        }
        errors.into_result(())
    }
}

/// Raw add-comment form input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
    pub author: String,
}

impl CommentForm {
    pub fn validate(&self, policy: &ValidationPolicy) -> Result<NewComment, FormErrors> {
        let mut errors = FormErrors::default();
        errors.min_len("text", "Comment", &self.text, policy.comment_text_min);
        errors.min_len("author", "Author name", &self.author, policy.comment_author_min);
        errors.into_result(NewComment {
            text: self.text.clone(),
            author: self.author.clone(),
        })
    }
}

fn check_title(errors: &mut FormErrors, title: &str, policy: &ValidationPolicy) {
    errors.min_len("title", "Title", title, policy.post_title_min);
    errors.max_len("title", "Title", title, policy.post_title_max);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_post() -> PostForm {
        PostForm {
            title: "Hello".to_string(),
            content: "Long enough body".to_string(),
            author: "Ann".to_string(),
        }
    }

    #[test]
    fn valid_post_passes() {
        let post = valid_post()
            .validate(&ValidationPolicy::default())
            .expect("valid post");
        assert_eq!(post.title, "Hello");
    }

    #[test]
    fn short_fields_are_all_reported() {
        let form = PostForm {
            title: "Hi".to_string(),
            content: "short".to_string(),
            author: "A".to_string(),
        };
        let errors = form
            .validate(&ValidationPolicy::default())
            .expect_err("invalid post");
        assert_eq!(errors.errors.len(), 3);
        assert!(errors.field("title").is_some());
        assert!(errors.field("content").is_some());
        assert!(errors.field("author").is_some());
    }

    #[test]
    fn title_longer_than_max_is_rejected() {
        let mut form = valid_post();
        form.title = "x".repeat(101);
        let errors = form
            .validate(&ValidationPolicy::default())
            .expect_err("too long");
        assert_eq!(
            errors.field("title").map(|e| e.message.as_str()),
            Some("Title must be at most 100 characters")
        );
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        let mut form = valid_post();
        form.author = "Яя".to_string();
        assert!(form.validate(&ValidationPolicy::default()).is_ok());
    }

    #[test]
    fn policy_thresholds_are_configurable() {
        let policy = ValidationPolicy {
            post_title_min: 1,
            post_content_min: 1,
            ..Default::default()
        };
        let form = PostForm {
            title: "T".to_string(),
            content: "C".to_string(),
            author: "Al".to_string(),
        };
        assert!(form.validate(&policy).is_ok());
    }

    #[test]
    fn empty_comment_text_is_rejected() {
        let form = CommentForm {
            text: String::new(),
            author: "Ann".to_string(),
        };
        let errors = form
            .validate(&ValidationPolicy::default())
            .expect_err("empty");
        assert_eq!(
            errors.field("text").map(|e| e.message.as_str()),
            Some("Comment must not be empty")
        );
        assert!(errors.field("author").is_none());
    }

    #[test]
    fn patch_checks_only_present_fields() {
        let patch = PostPatch {
            title: Some("New title".to_string()),
            ..Default::default()
        };
        assert!(patch.validate(&ValidationPolicy::default()).is_ok());

        let bad = PostPatch {
            content: Some("tiny".to_string()),
            ..Default::default()
        };
        let errors = bad
            .validate(&ValidationPolicy::default())
            .expect_err("short content");
        assert!(errors.field("content").is_some());
    }

    #[test]
    fn form_errors_display_lists_fields() {
        let errors = CommentForm::default()
            .validate(&ValidationPolicy::default())
            .expect_err("empty form");
        let rendered = errors.to_string();
        assert!(rendered.contains("text:"));
        assert!(rendered.contains("author:"));
    }
}
