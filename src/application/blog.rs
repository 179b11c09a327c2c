//! Named blog queries and mutations.
//!
//! Queries go through the query cache; mutations write to the document store
//! and then fire the cache trigger for the tags they invalidate.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument};

use crate::application::error::{QueryError, QueryErrorKind};
use crate::application::repos::{Document, DocumentStore, to_fields};
use crate::cache::{CacheConfig, QueryCache, QueryKey, QuerySource, QueryValue, Subscription};
use crate::domain::entities::{
    Collection, Comment, CommentFields, NewComment, NewPost, Post, PostFields, timestamp_now,
};
use crate::domain::forms::PostPatch;

/// Field of a comment that references its post.
pub const COMMENT_POST_FIELD: &str = "postId";

/// Result of a delete mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deleted {
    pub success: bool,
}

/// Loads query results straight from the document store.
pub struct StoreFetcher {
    store: Arc<dyn DocumentStore>,
}

impl StoreFetcher {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

fn decode_all<T: serde::de::DeserializeOwned>(
    documents: Vec<Document>,
    collection: Collection,
) -> Result<Vec<T>, QueryError> {
    documents
        .into_iter()
        .map(|document| document.decode(collection).map_err(QueryError::from))
        .collect()
}

#[async_trait]
impl QuerySource for StoreFetcher {
    async fn fetch(&self, key: &QueryKey) -> Result<QueryValue, QueryError> {
        match key {
            QueryKey::ListPosts => {
                let documents = self.store.list_all(Collection::Posts).await?;
                Ok(QueryValue::Posts(decode_all(documents, Collection::Posts)?))
            }
            QueryKey::GetPost(id) => {
                let post = match self.store.get_by_id(Collection::Posts, id).await? {
                    Some(document) => Some(document.decode::<Post>(Collection::Posts)?),
                    None => None,
                };
                Ok(QueryValue::Post(post))
            }
            QueryKey::ListComments(post_id) => {
                let documents = self
                    .store
                    .list_where(Collection::Comments, COMMENT_POST_FIELD, post_id)
                    .await?;
                Ok(QueryValue::Comments(decode_all(
                    documents,
                    Collection::Comments,
                )?))
            }
        }
    }
}

fn unexpected_shape(key: &QueryKey) -> QueryError {
    QueryError::new(
        QueryErrorKind::Decode,
        format!("unexpected result shape for {key}"),
    )
}

fn as_posts(value: QueryValue) -> Option<Vec<Post>> {
    match value {
        QueryValue::Posts(posts) => Some(posts),
        _ => None,
    }
}

fn as_post(value: QueryValue) -> Option<Option<Post>> {
    match value {
        QueryValue::Post(post) => Some(post),
        _ => None,
    }
}

fn as_comments(value: QueryValue) -> Option<Vec<Comment>> {
    match value {
        QueryValue::Comments(comments) => Some(comments),
        _ => None,
    }
}

/// Entry point for every read and write the views perform.
#[derive(Clone)]
pub struct BlogApi {
    store: Arc<dyn DocumentStore>,
    cache: QueryCache,
}

impl BlogApi {
    pub fn new(store: Arc<dyn DocumentStore>, config: CacheConfig) -> Self {
        let fetcher = Arc::new(StoreFetcher::new(Arc::clone(&store)));
        Self {
            store,
            cache: QueryCache::new(config, fetcher),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    async fn query<T>(
        &self,
        key: QueryKey,
        project: fn(QueryValue) -> Option<T>,
    ) -> Result<T, QueryError> {
        let value = self.cache.runner().read(&key).await?;
        project(value).ok_or_else(|| unexpected_shape(&key))
    }

    #[instrument(skip(self))]
    pub async fn list_posts(&self) -> Result<Vec<Post>, QueryError> {
        self.query(QueryKey::ListPosts, as_posts).await
    }

    /// `Ok(None)` when the post does not exist.
    #[instrument(skip(self))]
    pub async fn get_post(&self, id: &str) -> Result<Option<Post>, QueryError> {
        self.query(QueryKey::GetPost(id.to_string()), as_post).await
    }

    #[instrument(skip(self))]
    pub async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, QueryError> {
        self.query(QueryKey::ListComments(post_id.to_string()), as_comments)
            .await
    }

    pub async fn subscribe_posts(&self) -> Subscription<Vec<Post>> {
        self.cache
            .runner()
            .subscribe(QueryKey::ListPosts, as_posts)
            .await
    }

    pub async fn subscribe_post(&self, id: &str) -> Subscription<Option<Post>> {
        self.cache
            .runner()
            .subscribe(QueryKey::GetPost(id.to_string()), as_post)
            .await
    }

    pub async fn subscribe_comments(&self, post_id: &str) -> Subscription<Vec<Comment>> {
        self.cache
            .runner()
            .subscribe(QueryKey::ListComments(post_id.to_string()), as_comments)
            .await
    }

    /// Force a fetch of `key` regardless of what is cached.
    pub async fn refetch(&self, key: &QueryKey) -> Result<QueryValue, QueryError> {
        self.cache.runner().fetch(key).await
    }

    /// Returns the id the store assigned.
    #[instrument(skip(self, input))]
    pub async fn create_post(&self, input: NewPost) -> Result<String, QueryError> {
        let created_at = timestamp_now();
        let fields = to_fields(&PostFields {
            title: &input.title,
            content: &input.content,
            author: &input.author,
            created_at: &created_at,
        })?;

        let id = self.store.create(Collection::Posts, fields).await?;
        info!(post_id = %id, "Post created");

        self.cache.trigger().post_created(&id).await;
        Ok(id)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_post(&self, id: &str, patch: PostPatch) -> Result<(), QueryError> {
        let fields = to_fields(&patch)?;
        self.store.update(Collection::Posts, id, fields).await?;
        info!(post_id = %id, "Post updated");

        self.cache.trigger().post_updated(id).await;
        Ok(())
    }

    /// Comments of the post are left in place.
    #[instrument(skip(self))]
    pub async fn delete_post(&self, id: &str) -> Result<Deleted, QueryError> {
        self.store.delete(Collection::Posts, id).await?;
        info!(post_id = %id, "Post deleted");

        self.cache.trigger().post_deleted(id).await;
        Ok(Deleted { success: true })
    }

    #[instrument(skip(self, input))]
    pub async fn create_comment(
        &self,
        post_id: &str,
        input: NewComment,
    ) -> Result<String, QueryError> {
        let created_at = timestamp_now();
        let fields = to_fields(&CommentFields {
            text: &input.text,
            author: &input.author,
            created_at: &created_at,
            post_id,
        })?;

        let id = self.store.create(Collection::Comments, fields).await?;
        info!(post_id = %post_id, comment_id = %id, "Comment created");

        self.cache.trigger().comment_created(post_id, &id).await;
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn delete_comment(
        &self,
        post_id: &str,
        comment_id: &str,
    ) -> Result<Deleted, QueryError> {
        if comment_id.is_empty() {
            return Err(QueryError::precondition("Comment ID is missing"));
        }

        self.store.delete(Collection::Comments, comment_id).await?;
        info!(post_id = %post_id, comment_id = %comment_id, "Comment deleted");

        self.cache
            .trigger()
            .comment_deleted(post_id, comment_id)
            .await;
        Ok(Deleted { success: true })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn deleted_serializes_success_flag() {
        let value = serde_json::to_value(Deleted { success: true }).expect("serialize");
        assert_eq!(value, json!({ "success": true }));
    }

    #[test]
    fn projections_reject_mismatched_shapes() {
        assert!(as_posts(QueryValue::Comments(Vec::new())).is_none());
        assert!(as_post(QueryValue::Posts(Vec::new())).is_none());
        assert_eq!(as_comments(QueryValue::Comments(Vec::new())), Some(Vec::new()));
    }
}
