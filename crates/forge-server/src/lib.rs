//! Forge Connector HTTP server.
//!
//! Wires the core library and a storage backend into an Axum router. The
//! JSON API lives under `/forge/v1`; most of it requires a Forge signature.
//! Stored media files are served under `/uploads` and the CTA tracker under
//! `/assets`.

pub mod config;
pub mod error;
pub mod forge_api;
pub mod middleware;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::middleware as axum_mw;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::signature_middleware;
use crate::state::AppState;

/// Prefix of every API route.
pub const API_PREFIX: &str = "/forge/v1";

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let signed_routes = Router::new()
        .merge(routes::connection::router())
        .merge(routes::site::router())
        .merge(routes::posts::router())
        .merge(routes::media::router())
        .merge(routes::taxonomy::router())
        .merge(routes::cta::router())
        .route_layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            signature_middleware,
        ));

    let api = Router::new()
        .merge(routes::connection::public_router())
        .merge(routes::cta::public_router())
        .merge(signed_routes)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate, max-age=0"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-forge-signature"),
            HeaderName::from_static("x-forge-timestamp"),
            HeaderName::from_static("x-forge-site-id"),
            HeaderName::from_static("x-forge-plugin-version"),
        ]);

    Router::new()
        .nest(API_PREFIX, api)
        .merge(routes::uploads::router())
        .merge(routes::assets::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .with_state(state)
}
