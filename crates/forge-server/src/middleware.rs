//! Signature middleware for Forge Connector.
//!
//! Buffers the request body, checks the `X-Forge-*` signature headers against
//! the stored connection key, and hands the request on with the body
//! restored. The signed path is the full request path including the
//! `/forge/v1` prefix, so the middleware reads it from [`OriginalUri`] when
//! running inside a nested router.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{OriginalUri, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use forge_core::connection::SignedRequest;
use forge_core::signing::{SIGNATURE_HEADER, SITE_ID_HEADER, TIMESTAMP_HEADER};

use crate::error::AppError;
use crate::state::AppState;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Middleware that rejects requests without a valid Forge signature.
pub async fn signature_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| AppError::PayloadTooLarge(format!("request body rejected: {e}")))?;

    let path = parts
        .extensions
        .get::<OriginalUri>()
        .map_or_else(|| parts.uri.path(), |original| original.0.path());

    let signed = SignedRequest {
        method: parts.method.as_str(),
        path,
        body: &bytes,
        signature: header(&parts.headers, SIGNATURE_HEADER),
        timestamp: header(&parts.headers, TIMESTAMP_HEADER),
        site_id: header(&parts.headers, SITE_ID_HEADER),
    };
    state
        .connection
        .validate_request(&signed, chrono::Utc::now().timestamp())
        .await?;
    debug!(method = %parts.method, path, "signed request accepted");

    let req = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(req).await)
}
