//! CTA routes under `/forge/v1/cta`.
//!
//! Public:
//! - `GET /cta/render/{slug}?debug=1`: what the `[forge_cta]` shortcode expands to
//! - `GET /cta/footer?loaded=a,b`: site-wide CTAs for a page whose shortcodes
//!   placed `a` and `b`, the loaded CTA script and the tracker
//!
//! Signed:
//! - `GET  /cta/list`: every CTA of the site with its shortcode, fetched fresh
//! - `POST /cta/test`: check the CTA API and clear the cache on success
//! - `POST /cta/cache/clear`: drop cached CTAs

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use forge_core::connection::ConnectionSettings;
use forge_core::cta::{
    CtaCredentials, CtaPage, CtaSource, ShortcodeAttrs, TrackerConfig, render_shortcode,
    render_site_ctas, restore_loaded, shortcode, tracker_script,
};

use super::assets::TRACKER_PATH;
use super::connection::MessageResponse;
use crate::error::AppError;
use crate::state::AppState;

/// Public CTA routes.
pub fn public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cta/render/{slug}", get(render))
        .route("/cta/footer", get(footer))
}

/// Signed CTA routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cta/list", get(list))
        .route("/cta/test", post(test_api))
        .route("/cta/cache/clear", post(clear_cache))
}

#[derive(Debug, Default, Deserialize)]
struct RenderParams {
    #[serde(default)]
    debug: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FooterParams {
    #[serde(default)]
    loaded: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CtaSummary {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub is_active: bool,
    pub shortcode: String,
}

#[derive(Debug, Serialize)]
pub struct CtaListResponse {
    pub success: bool,
    pub ctas: Vec<CtaSummary>,
}

async fn render(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(params): Query<RenderParams>,
) -> Result<Html<String>, AppError> {
    let settings = state.connection.settings().await?;
    let attrs = ShortcodeAttrs {
        id: slug,
        debug: params.debug.unwrap_or_default(),
    };
    let mut page = CtaPage::new();
    let html = render_shortcode(&mut page, &attrs, &settings, state.ctas.as_ref(), state.debug).await;
    Ok(Html(html))
}

async fn footer(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FooterParams>,
) -> Result<Html<String>, AppError> {
    let settings = state.connection.settings().await?;
    let mut page = CtaPage::new();
    let placed = params
        .loaded
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|slug| !slug.is_empty())
        .collect::<Vec<&str>>();
    restore_loaded(&mut page, placed, &settings, state.ctas.as_ref()).await;

    let mut html = render_site_ctas(&mut page, &settings, state.ctas.as_ref()).await;
    if html.is_empty() && !page.loaded().is_empty() {
        html = page.loaded_script();
    }
    html.push_str(&tracker_script(&settings, &tracker_config(&state)));
    Ok(Html(html))
}

fn tracker_config(state: &AppState) -> TrackerConfig {
    TrackerConfig {
        api_url: state.api_url.clone(),
        script_url: format!("{}{TRACKER_PATH}", state.content.site().home_base()),
        debug: state.debug,
    }
}

fn require_credentials(settings: &ConnectionSettings) -> Result<CtaCredentials<'_>, AppError> {
    CtaCredentials::from_settings(settings)
        .ok_or_else(|| AppError::bad_request("not_connected", "site is not connected to Forge"))
}

async fn list(State(state): State<Arc<AppState>>) -> Result<Json<CtaListResponse>, AppError> {
    let settings = state.connection.settings().await?;
    let creds = require_credentials(&settings)?;
    let ctas = state
        .ctas
        .fetch_all_ctas(creds)
        .await?
        .into_iter()
        .map(|cta| CtaSummary {
            shortcode: shortcode(&cta.slug),
            kind: cta.kind.as_str().to_owned(),
            id: cta.id,
            name: cta.name,
            slug: cta.slug,
            is_active: cta.is_active,
        })
        .collect();
    Ok(Json(CtaListResponse { success: true, ctas }))
}

async fn test_api(State(state): State<Arc<AppState>>) -> Result<Json<MessageResponse>, AppError> {
    let settings = state.connection.settings().await?;
    if settings.site_id().is_none() {
        return Err(AppError::bad_request(
            "missing_site_id",
            "Site ID not configured. Try syncing from Forge first.",
        ));
    }
    let creds = require_credentials(&settings)?;
    state.ctas.test_api(creds).await?;
    state.ctas.clear().await;
    info!("CTA API reachable, cache cleared");
    Ok(Json(MessageResponse {
        success: true,
        message: "API connection successful! Cache cleared.",
    }))
}

async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    state.ctas.clear().await;
    info!("CTA cache cleared on request");
    Json(MessageResponse {
        success: true,
        message: "CTA cache cleared.",
    })
}
