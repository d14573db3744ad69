//! End-to-end tests of the HTTP API against an in-memory store.
//!
//! Requests are driven through the router with `tower::ServiceExt::oneshot`.
//! Forge itself is replaced by an in-process CTA source, a canned media
//! fetcher and a notifier that records disconnects.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;
use url::Url;

use forge_core::connection::{ConnectionKey, ConnectionManager, ConnectionSettings};
use forge_core::content::{ContentStore, MediaFetcher};
use forge_core::cta::{CachedCtaSource, Cta, CtaCredentials, CtaSource};
use forge_core::error::{ContentError, CtaError};
use forge_core::signing::{self, SIGNATURE_HEADER, SITE_ID_HEADER, TIMESTAMP_HEADER};
use forge_server::build_router;
use forge_server::config::ServerConfig;
use forge_server::forge_api::DisconnectNotifier;
use forge_server::state::AppState;
use forge_storage::MemoryBackend;

// ── Fakes ────────────────────────────────────────────────────────────

struct StaticCtas {
    ctas: Vec<Cta>,
}

#[async_trait]
impl CtaSource for StaticCtas {
    async fn fetch_by_slug(&self, _creds: CtaCredentials<'_>, slug: &str) -> Result<Cta, CtaError> {
        self.ctas
            .iter()
            .find(|c| c.slug == slug)
            .cloned()
            .ok_or_else(|| CtaError::NotFound {
                slug: slug.to_owned(),
            })
    }

    async fn fetch_site_ctas(&self, _creds: CtaCredentials<'_>) -> Result<Vec<Cta>, CtaError> {
        Ok(self
            .ctas
            .iter()
            .filter(|c| c.kind.as_str() != "banner")
            .cloned()
            .collect())
    }

    async fn fetch_all_ctas(&self, _creds: CtaCredentials<'_>) -> Result<Vec<Cta>, CtaError> {
        Ok(self.ctas.clone())
    }

    async fn test_api(&self, _creds: CtaCredentials<'_>) -> Result<(), CtaError> {
        Ok(())
    }

    fn lookup_url(&self, slug: &str) -> String {
        format!("https://forge.test/api/ctas/slug/{slug}")
    }
}

struct CannedFetcher;

#[async_trait]
impl MediaFetcher for CannedFetcher {
    async fn fetch(&self, _url: &Url) -> Result<Vec<u8>, ContentError> {
        Ok(b"remote bytes".to_vec())
    }
}

struct RecordingNotifier {
    tx: mpsc::UnboundedSender<Option<String>>,
}

#[async_trait]
impl DisconnectNotifier for RecordingNotifier {
    async fn notify_disconnect(&self, settings: &ConnectionSettings) {
        let _ = self.tx.send(settings.site_id().map(str::to_owned));
    }
}

fn cta(slug: &str, kind: &str, headline: &str) -> Cta {
    serde_json::from_value(json!({
        "id": format!("id-{slug}"),
        "name": slug,
        "slug": slug,
        "type": kind,
        "content": { "headline": headline }
    }))
    .unwrap()
}

// ── Harness ──────────────────────────────────────────────────────────

struct Harness {
    app: Router,
    key: String,
    disconnects: mpsc::UnboundedReceiver<Option<String>>,
}

fn harness() -> Harness {
    let config = ServerConfig::default();
    let storage = Arc::new(MemoryBackend::new());
    let source: Arc<dyn CtaSource> = Arc::new(StaticCtas {
        ctas: vec![
            cta("spring-sale", "banner", "Spring Sale"),
            cta("newsletter", "popup", "Join the newsletter"),
            cta("shipping", "floating-bar", "Free shipping"),
        ],
    });
    let (tx, disconnects) = mpsc::unbounded_channel();
    let state = AppState {
        connection: Arc::new(ConnectionManager::new(storage.clone())),
        content: Arc::new(ContentStore::new(
            storage,
            config.site.clone(),
            config.users.clone(),
        )),
        ctas: Arc::new(CachedCtaSource::new(source, Duration::from_secs(300))),
        media_fetcher: Arc::new(CannedFetcher),
        notifier: Arc::new(RecordingNotifier { tx }),
        api_url: "https://forge.test/api".to_owned(),
        debug: false,
        max_body_bytes: 1024 * 1024,
    };
    Harness {
        app: build_router(Arc::new(state)),
        key: ConnectionKey::generate().as_str().to_owned(),
        disconnects,
    }
}

struct Reply {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }
}

async fn send(app: &Router, req: Request<Body>) -> Reply {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    Reply {
        status,
        headers,
        body,
    }
}

async fn public(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Reply {
    let bytes = body.map(|b| b.to_string()).unwrap_or_default();
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .unwrap();
    send(app, req).await
}

/// Send a request signed with `key`. Only the path is signed, so `uri` may
/// carry a query string.
async fn signed(
    app: &Router,
    key: &str,
    site_id: Option<&str>,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Reply {
    let bytes = body.map(|b| b.to_string()).unwrap_or_default();
    let path = uri.split('?').next().unwrap();
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = signing::sign(key.as_bytes(), method, path, &timestamp, bytes.as_bytes());
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .header(TIMESTAMP_HEADER, timestamp);
    if let Some(site_id) = site_id {
        builder = builder.header(SITE_ID_HEADER, site_id);
    }
    send(app, builder.body(Body::from(bytes)).unwrap()).await
}

async fn connect(h: &Harness, site_id: &str) -> Reply {
    public(
        &h.app,
        "POST",
        "/forge/v1/connect",
        Some(json!({ "connection_key": h.key, "forge_site_id": site_id })),
    )
    .await
}

// ── Connection ───────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_connection() {
    let h = harness();
    let reply = public(&h.app, "GET", "/forge/v1/health", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["status"], "ok");
    assert_eq!(reply.json()["connected"], false);

    connect(&h, "site-1").await;
    let reply = public(&h.app, "GET", "/forge/v1/health", None).await;
    assert_eq!(reply.json()["connected"], true);
}

#[tokio::test]
async fn connect_then_signed_status() {
    let h = harness();
    let reply = connect(&h, "site-1").await;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Connected successfully!");
    assert!(body["site"]["name"].is_string());

    let reply = signed(&h.app, &h.key, Some("site-1"), "GET", "/forge/v1/status", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["status"]["connected"], true);
    assert_eq!(body["status"]["has_key"], true);
    assert_eq!(body["status"]["forge_site_id"], "site-1");
}

#[tokio::test]
async fn connect_rejects_malformed_key() {
    let h = harness();
    let reply = public(
        &h.app,
        "POST",
        "/forge/v1/connect",
        Some(json!({ "connection_key": "short" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["data"]["status"], 400);
}

#[tokio::test]
async fn reconnect_needs_the_existing_key() {
    let h = harness();
    connect(&h, "site-1").await;

    let reply = public(&h.app, "POST", "/forge/v1/connect", Some(json!({}))).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.json()["code"], "forge_already_connected");

    let other = ConnectionKey::generate();
    let reply = public(
        &h.app,
        "POST",
        "/forge/v1/connect",
        Some(json!({ "connection_key": other.as_str() })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.json()["code"], "forge_invalid_connection_key");

    let reply = connect(&h, "site-1").await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn disconnect_notifies_forge_and_clears_key() {
    let mut h = harness();
    connect(&h, "site-1").await;

    let reply = signed(&h.app, &h.key, None, "POST", "/forge/v1/disconnect", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["message"], "Disconnected successfully.");

    let notified = tokio::time::timeout(Duration::from_secs(5), h.disconnects.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notified.as_deref(), Some("site-1"));

    let reply = signed(&h.app, &h.key, None, "GET", "/forge/v1/status", None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["code"], "forge_not_configured");
}

// ── Authentication ───────────────────────────────────────────────────

#[tokio::test]
async fn signed_routes_require_headers() {
    let h = harness();
    connect(&h, "").await;
    let reply = public(&h.app, "GET", "/forge/v1/posts", None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["code"], "forge_missing_auth");
}

#[tokio::test]
async fn wrong_key_is_rejected() {
    let h = harness();
    connect(&h, "").await;
    let other = ConnectionKey::generate();
    let reply = signed(&h.app, other.as_str(), None, "GET", "/forge/v1/posts", None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["code"], "forge_invalid_signature");
}

#[tokio::test]
async fn tampered_body_is_rejected() {
    let h = harness();
    connect(&h, "").await;

    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = signing::sign(
        h.key.as_bytes(),
        "POST",
        "/forge/v1/posts",
        &timestamp,
        br#"{"title":"Signed"}"#,
    );
    let req = Request::builder()
        .method("POST")
        .uri("/forge/v1/posts")
        .header(SIGNATURE_HEADER, signature)
        .header(TIMESTAMP_HEADER, timestamp)
        .body(Body::from(r#"{"title":"Tampered"}"#))
        .unwrap();
    let reply = send(&h.app, req).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["code"], "forge_invalid_signature");
}

#[tokio::test]
async fn stale_timestamp_is_rejected() {
    let h = harness();
    connect(&h, "").await;

    let timestamp = (chrono::Utc::now().timestamp() - 301).to_string();
    let signature = signing::sign(h.key.as_bytes(), "GET", "/forge/v1/posts", &timestamp, b"");
    let req = Request::builder()
        .method("GET")
        .uri("/forge/v1/posts")
        .header(SIGNATURE_HEADER, signature)
        .header(TIMESTAMP_HEADER, timestamp)
        .body(Body::empty())
        .unwrap();
    let reply = send(&h.app, req).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["code"], "forge_expired_request");
}

#[tokio::test]
async fn first_site_id_is_pinned() {
    let h = harness();
    connect(&h, "").await;

    let reply = signed(&h.app, &h.key, Some("site-a"), "GET", "/forge/v1/status", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["status"]["forge_site_id"], "site-a");

    let reply = signed(&h.app, &h.key, Some("site-b"), "GET", "/forge/v1/status", None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["code"], "forge_site_mismatch");

    // No site id header at all is still fine.
    let reply = signed(&h.app, &h.key, None, "GET", "/forge/v1/status", None).await;
    assert_eq!(reply.status, StatusCode::OK);
}

// ── Headers ──────────────────────────────────────────────────────────

#[tokio::test]
async fn api_responses_are_not_cached() {
    let h = harness();
    let reply = public(&h.app, "GET", "/forge/v1/health", None).await;
    assert_eq!(
        reply.headers[header::CACHE_CONTROL],
        "no-cache, no-store, must-revalidate, max-age=0"
    );
    assert_eq!(reply.headers[header::PRAGMA], "no-cache");
    assert_eq!(reply.headers[header::EXPIRES], "0");
    assert_eq!(reply.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let h = harness();
    let reply = public(&h.app, "GET", "/forge/v1/nope", None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

// ── Content ──────────────────────────────────────────────────────────

#[tokio::test]
async fn post_lifecycle() {
    let h = harness();
    connect(&h, "").await;
    let key = h.key.as_str();

    let reply = signed(
        &h.app,
        key,
        None,
        "POST",
        "/forge/v1/posts",
        Some(json!({ "title": "Hello World", "content": "<p>Body</p>", "status": "publish" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["message"], "Post created successfully.");
    assert_eq!(body["post"]["slug"], "hello-world");
    assert_eq!(body["post"]["status"], "publish");
    let id = body["post"]["id"].as_u64().unwrap();

    let reply = signed(&h.app, key, None, "GET", &format!("/forge/v1/posts/{id}"), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["post"]["title"], "Hello World");

    let reply = signed(
        &h.app,
        key,
        None,
        "PUT",
        &format!("/forge/v1/posts/{id}"),
        Some(json!({ "title": "Hello Again" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["post"]["title"], "Hello Again");

    let reply = signed(&h.app, key, None, "GET", "/forge/v1/posts?status=publish", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["total"], 1);

    let reply = signed(&h.app, key, None, "DELETE", &format!("/forge/v1/posts/{id}"), None).await;
    assert_eq!(reply.json()["message"], "Post moved to trash.");

    let reply = signed(
        &h.app,
        key,
        None,
        "GET",
        &format!("/forge/v1/posts/{id}/verify"),
        None,
    )
    .await;
    assert_eq!(reply.json()["exists"], true);
    assert_eq!(reply.json()["status"], "trash");

    let reply = signed(
        &h.app,
        key,
        None,
        "DELETE",
        &format!("/forge/v1/posts/{id}"),
        Some(json!({ "force": true })),
    )
    .await;
    assert_eq!(reply.json()["message"], "Post permanently deleted.");

    let reply = signed(&h.app, key, None, "GET", &format!("/forge/v1/posts/{id}"), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_post_requires_title() {
    let h = harness();
    connect(&h, "").await;
    let reply = signed(
        &h.app,
        &h.key,
        None,
        "POST",
        "/forge/v1/posts",
        Some(json!({ "content": "no title" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], "missing_title");
}

#[tokio::test]
async fn invalid_json_body_is_400() {
    let h = harness();
    connect(&h, "").await;

    let body = "{not json";
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = signing::sign(
        h.key.as_bytes(),
        "POST",
        "/forge/v1/posts",
        &timestamp,
        body.as_bytes(),
    );
    let req = Request::builder()
        .method("POST")
        .uri("/forge/v1/posts")
        .header(SIGNATURE_HEADER, signature)
        .header(TIMESTAMP_HEADER, timestamp)
        .body(Body::from(body))
        .unwrap();
    let reply = send(&h.app, req).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], "invalid_json");
}

#[tokio::test]
async fn categories_and_tags() {
    let h = harness();
    connect(&h, "").await;
    let key = h.key.as_str();

    let reply = signed(
        &h.app,
        key,
        None,
        "POST",
        "/forge/v1/categories",
        Some(json!({ "name": "News" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["category"]["slug"], "news");

    let reply = signed(
        &h.app,
        key,
        None,
        "POST",
        "/forge/v1/tags",
        Some(json!({ "name": "Rust Lang" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["tag"]["slug"], "rust-lang");

    let reply = signed(&h.app, key, None, "GET", "/forge/v1/tags", None).await;
    let tags = reply.json()["tags"].as_array().unwrap().clone();
    assert_eq!(tags.len(), 1);
}

#[tokio::test]
async fn sync_snapshot_describes_site() {
    let h = harness();
    connect(&h, "").await;
    let reply = signed(&h.app, &h.key, None, "GET", "/forge/v1/sync", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["success"], true);
    assert!(body["site"].is_object());
    assert!(body["post_types"].is_array());
}

#[tokio::test]
async fn media_upload_is_served_from_uploads() {
    let h = harness();
    connect(&h, "").await;

    let data = base64::engine::general_purpose::STANDARD.encode(b"hello file");
    let reply = signed(
        &h.app,
        &h.key,
        None,
        "POST",
        "/forge/v1/media",
        Some(json!({ "file_data": data, "filename": "notes.txt", "title": "Notes" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["message"], "Media uploaded successfully.");
    assert_eq!(body["media"]["filename"], "notes.txt");
    assert_eq!(body["media"]["mime_type"], "text/plain");

    let url = Url::parse(body["media"]["url"].as_str().unwrap()).unwrap();
    let reply = public(&h.app, "GET", url.path(), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[header::CONTENT_TYPE], "text/plain");
    assert_eq!(reply.body, b"hello file");

    let id = body["media"]["id"].as_u64().unwrap();
    let reply = public(&h.app, "GET", &format!("/uploads/{id}/other.txt"), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn media_upload_from_url_uses_fetcher() {
    let h = harness();
    connect(&h, "").await;
    let reply = signed(
        &h.app,
        &h.key,
        None,
        "POST",
        "/forge/v1/media/upload-from-url",
        Some(json!({ "url": "https://cdn.example.com/files/report.txt" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["media"]["filename"], "report.txt");
    assert_eq!(reply.json()["media"]["file_size"], 12);
}

#[tokio::test]
async fn non_numeric_ids_match_no_route() {
    let h = harness();
    connect(&h, "").await;
    let reply = signed(&h.app, &h.key, None, "GET", "/forge/v1/media/abc", None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.json()["code"], "rest_no_route");
}

// ── CTAs ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn cta_render_when_not_connected() {
    let h = harness();
    let reply = public(&h.app, "GET", "/forge/v1/cta/render/spring-sale", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.text(), "<!-- Forge CTA: Not connected to Forge -->");
}

#[tokio::test]
async fn cta_render_found_and_missing() {
    let h = harness();
    connect(&h, "site-1").await;

    let reply = public(&h.app, "GET", "/forge/v1/cta/render/spring-sale", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let html = reply.text();
    assert!(html.contains("data-cta-id=\"id-spring-sale\""));
    assert!(html.contains("Spring Sale"));

    let reply = public(&h.app, "GET", "/forge/v1/cta/render/missing", None).await;
    assert!(reply.text().starts_with("<!-- Forge CTA"));
    assert!(reply.text().contains("missing"));

    let reply = public(&h.app, "GET", "/forge/v1/cta/render/missing?debug=1", None).await;
    assert!(reply.text().contains("https://forge.test/api/ctas/slug/missing"));
}

#[tokio::test]
async fn cta_footer_skips_loaded_ctas() {
    let h = harness();
    connect(&h, "site-1").await;

    let reply = public(&h.app, "GET", "/forge/v1/cta/footer", None).await;
    let html = reply.text();
    assert!(html.contains("data-cta-type=\"popup\""));
    assert!(html.contains("data-cta-type=\"floating-bar\""));
    assert!(html.contains("window.forgeCTAsLoaded"));

    let reply = public(&h.app, "GET", "/forge/v1/cta/footer?loaded=newsletter", None).await;
    let html = reply.text();
    assert!(!html.contains("data-cta-type=\"popup\""));
    assert!(html.contains("data-cta-type=\"floating-bar\""));
    assert!(html.contains("window.forgeCTAsLoaded = [{\"id\":\"id-newsletter\""));
}

#[tokio::test]
async fn cta_footer_reports_placed_ctas_without_repeating_them() {
    let h = harness();
    connect(&h, "site-1").await;

    let reply = public(
        &h.app,
        "GET",
        "/forge/v1/cta/footer?loaded=spring-sale,newsletter,shipping",
        None,
    )
    .await;
    let html = reply.text();
    assert!(!html.contains("data-cta-id="));
    assert!(html.contains("window.forgeCTAsLoaded = [{\"id\":\"id-spring-sale\""));
    assert!(html.contains("\"id\":\"id-shipping\""));
}

#[tokio::test]
async fn cta_tracker_is_configured_only_when_connected() {
    let h = harness();
    let reply = public(&h.app, "GET", "/forge/v1/cta/footer", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(!reply.text().contains("forgeCTA"));

    connect(&h, "site-1").await;
    let html = public(&h.app, "GET", "/forge/v1/cta/footer", None).await.text();
    assert!(html.contains(
        "window.forgeCTA = {\"apiUrl\":\"https://forge.test/api\",\"siteId\":\"site-1\",\"debug\":false};"
    ));
    assert!(html.contains("/assets/js/cta-tracker.js\" defer></script>"));
}

#[tokio::test]
async fn cta_tracker_script_is_served() {
    let h = harness();
    let reply = public(&h.app, "GET", "/assets/js/cta-tracker.js", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(
        reply.headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/javascript")
    );
    let js = reply.text();
    assert!(js.contains("window.forgeCTA"));
    assert!(js.contains("/ctas/event"));
}

#[tokio::test]
async fn cta_list_is_signed() {
    let h = harness();
    connect(&h, "site-1").await;

    let reply = public(&h.app, "GET", "/forge/v1/cta/list", None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = signed(&h.app, &h.key, Some("site-1"), "GET", "/forge/v1/cta/list", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let ctas = reply.json()["ctas"].as_array().unwrap().clone();
    assert_eq!(ctas.len(), 3);
    assert!(
        ctas.iter()
            .any(|c| c["shortcode"] == "[forge_cta id=\"shipping\"]")
    );
    let banner = ctas.iter().find(|c| c["slug"] == "spring-sale").unwrap();
    assert_eq!(banner["type"], "banner");
    assert_eq!(banner["shortcode"], "[forge_cta id=\"spring-sale\"]");

    let reply = signed(
        &h.app,
        &h.key,
        Some("site-1"),
        "POST",
        "/forge/v1/cta/cache/clear",
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["success"], true);
}

#[tokio::test]
async fn cta_api_test_needs_a_site_id() {
    let h = harness();
    connect(&h, "").await;
    let reply = signed(&h.app, &h.key, None, "POST", "/forge/v1/cta/test", None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], "missing_site_id");
    assert_eq!(
        reply.json()["message"],
        "Site ID not configured. Try syncing from Forge first."
    );
}

#[tokio::test]
async fn cta_api_test_reports_success() {
    let h = harness();
    connect(&h, "site-1").await;
    let reply = public(&h.app, "POST", "/forge/v1/cta/test", None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = signed(&h.app, &h.key, Some("site-1"), "POST", "/forge/v1/cta/test", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["success"], true);
    assert_eq!(reply.json()["message"], "API connection successful! Cache cleared.");
}
