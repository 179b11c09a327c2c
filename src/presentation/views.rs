//! View models built from filter state and query results.

use serde::Serialize;

use crate::domain::entities::{Comment, Post};
use crate::domain::filter::{FilterState, apply_filter};

pub const NO_POSTS: &str = "No posts yet";
pub const NO_MATCHING_POSTS: &str = "No posts match the filter";
pub const NO_COMMENTS: &str = "No comments yet";
pub const NO_MATCHING_COMMENTS: &str = "No comments match the filter";

/// The post list as shown: the filtered subset plus the filter that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListView {
    pub filter: String,
    /// Number of posts before filtering.
    pub total: usize,
    pub posts: Vec<Post>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<&'static str>,
}

impl PostListView {
    pub fn build(posts: &[Post], filter: &FilterState) -> Self {
        let visible = apply_filter(posts, filter.value());
        let empty_message = match (posts.is_empty(), visible.is_empty()) {
            (true, _) => Some(NO_POSTS),
            (false, true) => Some(NO_MATCHING_POSTS),
            (false, false) => None,
        };
        Self {
            filter: filter.value().to_string(),
            total: posts.len(),
            posts: visible,
            empty_message,
        }
    }
}

/// One post with its filtered comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetailView {
    pub post: Post,
    pub comment_filter: String,
    pub total_comments: usize,
    pub comments: Vec<Comment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<&'static str>,
}

impl PostDetailView {
    pub fn build(post: Post, comments: &[Comment], filter: &FilterState) -> Self {
        let visible = apply_filter(comments, filter.value());
        let empty_message = match (comments.is_empty(), visible.is_empty()) {
            (true, _) => Some(NO_COMMENTS),
            (false, true) => Some(NO_MATCHING_COMMENTS),
            (false, false) => None,
        };
        Self {
            post,
            comment_filter: filter.value().to_string(),
            total_comments: comments.len(),
            comments: visible,
            empty_message,
        }
    }
}
