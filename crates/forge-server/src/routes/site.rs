//! Site routes: `/forge/v1/{sync,users,post-types,post-statuses}`.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use forge_core::content::{PostStatus, PostTypeView, SyncSnapshot, UserView};

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sync", get(sync))
        .route("/users", get(users))
        .route("/post-types", get(post_types))
        .route("/post-statuses", get(post_statuses))
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    #[serde(flatten)]
    pub snapshot: SyncSnapshot,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub success: bool,
    pub users: Vec<UserView>,
}

#[derive(Debug, Serialize)]
pub struct PostTypesResponse {
    pub success: bool,
    pub post_types: Vec<PostTypeView>,
}

#[derive(Debug, Serialize)]
pub struct PostStatusesResponse {
    pub success: bool,
    pub post_statuses: Vec<PostStatus>,
}

/// Everything Forge needs for a full sync in one response.
async fn sync(State(state): State<Arc<AppState>>) -> Result<Json<SyncResponse>, AppError> {
    Ok(Json(SyncResponse {
        success: true,
        snapshot: state.content.sync().await?,
    }))
}

async fn users(State(state): State<Arc<AppState>>) -> Json<UsersResponse> {
    Json(UsersResponse {
        success: true,
        users: state.content.list_authors(),
    })
}

async fn post_types(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PostTypesResponse>, AppError> {
    Ok(Json(PostTypesResponse {
        success: true,
        post_types: state.content.post_types().await?,
    }))
}

async fn post_statuses(State(state): State<Arc<AppState>>) -> Json<PostStatusesResponse> {
    Json(PostStatusesResponse {
        success: true,
        post_statuses: state.content.post_statuses(),
    })
}
