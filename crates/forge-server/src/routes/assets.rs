//! Static front-end assets: `GET /assets/js/cta-tracker.js`.

use std::sync::Arc;

use axum::http::{HeaderValue, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// Path the CTA tracker is served from, relative to the site root.
pub const TRACKER_PATH: &str = "/assets/js/cta-tracker.js";

const TRACKER_JS: &str = include_str!("../../assets/cta-tracker.js");

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(TRACKER_PATH, get(tracker))
}

async fn tracker() -> impl IntoResponse {
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/javascript; charset=utf-8"),
            ),
            (header::CACHE_CONTROL, HeaderValue::from_static("public, max-age=3600")),
        ],
        TRACKER_JS,
    )
}
