//! Media routes: `/forge/v1/media`, `/forge/v1/media/{id}` and
//! `/forge/v1/media/upload-from-url`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use forge_core::content::{MediaList, MediaQuery, MediaUpdate, MediaUpload, MediaView};

use super::connection::MessageResponse;
use super::{DeleteBody, json_body, path_id};
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/media", get(list_media).post(upload_media))
        .route("/media/upload-from-url", post(upload_from_url))
        .route(
            "/media/{id}",
            get(get_media)
                .put(update_media)
                .patch(update_media)
                .post(update_media)
                .delete(delete_media),
        )
}

#[derive(Debug, Serialize)]
pub struct MediaListResponse {
    pub success: bool,
    #[serde(flatten)]
    pub list: MediaList,
}

#[derive(Debug, Serialize)]
pub struct MediaResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub media: MediaView,
}

async fn list_media(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MediaQuery>,
) -> Result<Json<MediaListResponse>, AppError> {
    Ok(Json(MediaListResponse {
        success: true,
        list: state.content.list_media(&query).await?,
    }))
}

async fn get_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MediaResponse>, AppError> {
    let id = path_id(&id)?;
    Ok(Json(MediaResponse {
        success: true,
        message: None,
        media: state.content.get_media(id).await?,
    }))
}

/// Upload from base64 `file_data`, or from `file_url` when given.
async fn upload_media(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<MediaResponse>, AppError> {
    let input: MediaUpload = json_body(&body)?;
    let media = state
        .content
        .upload_media(&input, state.media_fetcher.as_ref())
        .await?;
    Ok(Json(MediaResponse {
        success: true,
        message: Some("Media uploaded successfully."),
        media,
    }))
}

async fn upload_from_url(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<MediaResponse>, AppError> {
    let input: MediaUpload = json_body(&body)?;
    let media = state
        .content
        .upload_from_url(&input, state.media_fetcher.as_ref())
        .await?;
    Ok(Json(MediaResponse {
        success: true,
        message: Some("Media uploaded successfully."),
        media,
    }))
}

async fn update_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<MediaResponse>, AppError> {
    let id = path_id(&id)?;
    let input: MediaUpdate = json_body(&body)?;
    Ok(Json(MediaResponse {
        success: true,
        message: Some("Media updated successfully."),
        media: state.content.update_media(id, &input).await?,
    }))
}

/// Attachments are always removed; `force` is accepted and ignored.
async fn delete_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<MessageResponse>, AppError> {
    let id = path_id(&id)?;
    json_body::<DeleteBody>(&body)?;
    state.content.delete_media(id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Media deleted successfully.",
    }))
}
