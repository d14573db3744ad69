//! Uploaded file route: `GET /uploads/{id}/{filename}`.
//!
//! Serves the bytes behind the `url` reported for each attachment. Public,
//! like files under a site's uploads directory.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use super::path_id;
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/uploads/{id}/{filename}", get(serve_upload))
}

async fn serve_upload(
    State(state): State<Arc<AppState>>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let id = path_id(&id)?;
    let file = state.content.media_file(id).await?;
    if file.filename != filename {
        return Err(AppError::NotFound {
            code: "not_found",
            message: format!("no file named {filename} for media {id}"),
        });
    }

    let content_type = HeaderValue::from_str(&file.mime_type)
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        ],
        file.bytes,
    )
        .into_response())
}
