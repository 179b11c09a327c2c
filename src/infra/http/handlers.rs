//! Blog handlers

use axum::Json;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::domain::filter::Filters;
use crate::domain::forms::{CommentForm, PostForm, PostPatch};
use crate::presentation::submit::{
    remove_comment, remove_post, submit_comment, submit_post, submit_post_update,
};
use crate::presentation::views::{PostDetailView, PostListView};

use super::error::ApiError;
use super::models::{CreatedResponse, DeletePostQuery, HealthResponse};
use super::state::HttpState;

fn filters(query: Option<String>) -> Filters {
    Filters::from_query(query.as_deref().unwrap_or_default())
}

pub async fn health(State(state): State<HttpState>) -> impl IntoResponse {
    let cache = state.blog.cache();
    Json(HealthResponse {
        status: "ok",
        cached_queries: cache.cached_queries(),
        live_subscriptions: cache.subscriptions().active_keys().len(),
    })
}

pub async fn list_posts(
    State(state): State<HttpState>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse, ApiError> {
    let filters = filters(query);
    let posts = state
        .blog
        .list_posts()
        .await
        .map_err(|err| ApiError::query("Failed to load posts", err))?;

    Ok(Json(PostListView::build(&posts, &filters.posts)))
}

pub async fn get_post(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse, ApiError> {
    let filters = filters(query);
    let post = state
        .blog
        .get_post(&id)
        .await
        .map_err(|err| ApiError::query("Failed to load post", err))?
        .ok_or_else(|| ApiError::not_found("post not found"))?;

    let comments = state
        .blog
        .list_comments(&id)
        .await
        .map_err(|err| ApiError::query("Failed to load comments", err))?;

    Ok(Json(PostDetailView::build(
        post,
        &comments,
        &filters.comments,
    )))
}

pub async fn create_post(
    State(state): State<HttpState>,
    Json(form): Json<PostForm>,
) -> Result<impl IntoResponse, ApiError> {
    let id = submit_post(&state.blog, &state.validation, &form).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

pub async fn update_post(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    Json(patch): Json<PostPatch>,
) -> Result<impl IntoResponse, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::bad_request(
            "Nothing to update",
            Some("send at least one of title, content, author".to_string()),
        ));
    }
    submit_post_update(&state.blog, &state.validation, &id, &patch).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_post(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    Query(query): Query<DeletePostQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if !query.confirm {
        return Err(ApiError::confirmation_required());
    }
    let deleted = remove_post(&state.blog, &id).await?;
    Ok(Json(deleted))
}

pub async fn create_comment(
    State(state): State<HttpState>,
    Path(post_id): Path<String>,
    Json(form): Json<CommentForm>,
) -> Result<impl IntoResponse, ApiError> {
    let id = submit_comment(&state.blog, &state.validation, &post_id, &form).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

pub async fn delete_comment(
    State(state): State<HttpState>,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = remove_comment(&state.blog, &post_id, &comment_id).await?;
    Ok(Json(deleted))
}
