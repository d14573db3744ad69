//! Post routes: `/forge/v1/posts` and `/forge/v1/posts/{id}`.
//!
//! Paths:
//! - `GET    /posts`: list with filters and paging
//! - `POST   /posts`: create
//! - `GET    /posts/{id}`: read, content included
//! - `PUT|PATCH|POST /posts/{id}`: partial update
//! - `DELETE /posts/{id}`: trash, or remove with `{"force": true}`
//! - `GET    /posts/{id}/verify`: existence check

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use forge_core::content::{DeleteOutcome, PostInput, PostList, PostQuery, PostVerification, PostView};

use super::connection::MessageResponse;
use super::{DeleteBody, json_body, path_id};
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post)
                .put(update_post)
                .patch(update_post)
                .post(update_post)
                .delete(delete_post),
        )
        .route("/posts/{id}/verify", get(verify_post))
}

// ── Response types ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub success: bool,
    #[serde(flatten)]
    pub list: PostList,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub post: PostView,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(flatten)]
    pub verification: PostVerification,
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PostQuery>,
) -> Result<Json<PostListResponse>, AppError> {
    Ok(Json(PostListResponse {
        success: true,
        list: state.content.list_posts(&query).await?,
    }))
}

async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PostResponse>, AppError> {
    let id = path_id(&id)?;
    Ok(Json(PostResponse {
        success: true,
        message: None,
        post: state.content.get_post(id).await?,
    }))
}

async fn create_post(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PostResponse>, AppError> {
    let input: PostInput = json_body(&body)?;
    Ok(Json(PostResponse {
        success: true,
        message: Some("Post created successfully."),
        post: state.content.create_post(&input).await?,
    }))
}

async fn update_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<PostResponse>, AppError> {
    let id = path_id(&id)?;
    let input: PostInput = json_body(&body)?;
    Ok(Json(PostResponse {
        success: true,
        message: Some("Post updated successfully."),
        post: state.content.update_post(id, &input).await?,
    }))
}

async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<MessageResponse>, AppError> {
    let id = path_id(&id)?;
    let force = json_body::<DeleteBody>(&body)?.force();
    let message = match state.content.delete_post(id, force).await? {
        DeleteOutcome::Trashed => "Post moved to trash.",
        DeleteOutcome::Deleted => "Post permanently deleted.",
    };
    Ok(Json(MessageResponse {
        success: true,
        message,
    }))
}

async fn verify_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VerifyResponse>, AppError> {
    let id = path_id(&id)?;
    Ok(Json(VerifyResponse {
        success: true,
        verification: state.content.verify_post(id).await?,
    }))
}
