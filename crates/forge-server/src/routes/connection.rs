//! Connection routes: `/forge/v1/{connect,health,status,disconnect}`.
//!
//! `connect` and `health` are public. `connect` is guarded by
//! [`ConnectionManager::authorize_connect`] instead of a signature: a site
//! that is already connected only accepts the key it holds.
//!
//! [`ConnectionManager::authorize_connect`]: forge_core::connection::ConnectionManager::authorize_connect

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use forge_core::connection::ConnectionStatus;
use forge_core::content::SiteInfo;
use forge_core::sanitize::sanitize_text_field;
use forge_core::signing::PLUGIN_VERSION;

use super::json_body;
use crate::error::AppError;
use crate::state::AppState;

/// Public connection routes.
pub fn public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/connect", post(connect))
        .route("/health", get(health))
}

/// Signed connection routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(status))
        .route("/disconnect", post(disconnect))
}

// ── Request / response types ─────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ConnectRequest {
    #[serde(default)]
    connection_key: Option<String>,
    #[serde(default)]
    forge_site_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub success: bool,
    pub message: &'static str,
    pub site: SiteInfo,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: ConnectionStatus,
    pub site: SiteInfo,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connected: bool,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Run the connect handshake.
async fn connect(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ConnectResponse>, AppError> {
    let req: ConnectRequest = json_body(&body)?;
    let key = sanitize_text_field(req.connection_key.as_deref().unwrap_or_default());
    let site_id = sanitize_text_field(req.forge_site_id.as_deref().unwrap_or_default());

    state.connection.authorize_connect(&key).await?;
    state.connection.connect(&key, Some(&site_id)).await?;
    // CTAs cached for a previous connection are stale now.
    state.ctas.clear().await;
    info!(site_id = %site_id, "site connected");

    Ok(Json(ConnectResponse {
        success: true,
        message: "Connected successfully!",
        site: state.content.site().clone(),
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, AppError> {
    Ok(Json(HealthResponse {
        status: "ok",
        version: PLUGIN_VERSION,
        connected: state.connection.is_connected().await?,
    }))
}

async fn status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, AppError> {
    Ok(Json(StatusResponse {
        success: true,
        status: state.connection.status().await?,
        site: state.content.site().clone(),
    }))
}

/// Drop the connection. Forge is notified in the background; the local
/// disconnect does not wait for it.
async fn disconnect(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, AppError> {
    let settings = state.connection.settings().await?;
    let notifier = Arc::clone(&state.notifier);
    tokio::spawn(async move {
        notifier.notify_disconnect(&settings).await;
    });

    state.connection.disconnect().await?;
    state.ctas.clear().await;
    info!("site disconnected");

    Ok(Json(MessageResponse {
        success: true,
        message: "Disconnected successfully.",
    }))
}
