//! Outbound HTTP to Forge and to arbitrary file hosts.
//!
//! [`ForgeApiClient`] fetches CTAs and sends the disconnect webhook.
//! [`HttpMediaFetcher`] downloads remote files for URL uploads.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::{Host, Url};

use forge_core::connection::ConnectionSettings;
use forge_core::content::MediaFetcher;
use forge_core::content::media::is_public_ip;
use forge_core::cta::{Cta, CtaCredentials, CtaSource};
use forge_core::error::{ContentError, CtaError};

const CTA_TIMEOUT: Duration = Duration::from_secs(10);
const LISTING_TIMEOUT: Duration = Duration::from_secs(15);
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

const SITE_ID_HEADER: &str = "X-Forge-Site-Id";
const CONNECTION_KEY_HEADER: &str = "X-Forge-Connection-Key";

/// Tells Forge that this site dropped the connection.
#[async_trait]
pub trait DisconnectNotifier: Send + Sync {
    /// Best effort. Failures are logged, never returned.
    async fn notify_disconnect(&self, settings: &ConnectionSettings);
}

/// Client for the Forge API.
#[derive(Debug, Clone)]
pub struct ForgeApiClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SiteCtas {
    #[serde(default)]
    ctas: Vec<Value>,
}

impl ForgeApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get(
        &self,
        path: &str,
        creds: CtaCredentials<'_>,
        timeout: Duration,
    ) -> Result<(StatusCode, String), CtaError> {
        let resp = self
            .http
            .get(self.url(path))
            .header(SITE_ID_HEADER, creds.site_id)
            .header(CONNECTION_KEY_HEADER, creds.connection_key.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| CtaError::Request {
                reason: e.to_string(),
            })?;
        let status = resp.status();
        debug!(path, %status, "forge api response");
        let body = resp.text().await.map_err(|e| CtaError::Request {
            reason: e.to_string(),
        })?;
        Ok((status, body))
    }

    async fn get_body(&self, path: &str, creds: CtaCredentials<'_>) -> Result<String, CtaError> {
        Ok(self.get(path, creds, CTA_TIMEOUT).await?.1)
    }

    /// Full URL of the disconnect webhook.
    #[must_use]
    pub fn disconnect_url(&self) -> String {
        self.url("/webhooks/wordpress/disconnect")
    }
}

/// Decode a single-CTA response. Empty bodies, non-objects and
/// `{"error": ...}` payloads all mean "no such CTA".
fn decode_cta(slug: &str, body: &str) -> Result<Cta, CtaError> {
    let not_found = || CtaError::NotFound {
        slug: slug.to_owned(),
    };
    let value: Value = serde_json::from_str(body).map_err(|_| not_found())?;
    let Some(object) = value.as_object() else {
        return Err(not_found());
    };
    if object.is_empty() || object.contains_key("error") {
        return Err(not_found());
    }
    serde_json::from_value(value).map_err(|e| CtaError::Decode {
        reason: e.to_string(),
    })
}

/// The body of a 200 response. Anything else becomes [`CtaError::Api`]
/// with Forge's `error` message, or the bare status when it sent none.
fn require_ok(status: StatusCode, body: String) -> Result<String, CtaError> {
    if status == StatusCode::OK {
        return Ok(body);
    }
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| format!("API returned status {}", status.as_u16()));
    Err(CtaError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Decode a `{"ctas": [...]}` response, skipping entries that do not parse.
fn decode_site_ctas(body: &str) -> Vec<Cta> {
    let Ok(list) = serde_json::from_str::<SiteCtas>(body) else {
        return Vec::new();
    };
    list.ctas
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<Cta>(raw) {
            Ok(cta) => Some(cta),
            Err(e) => {
                warn!(error = %e, "skipping undecodable site CTA");
                None
            }
        })
        .collect()
}

#[async_trait]
impl CtaSource for ForgeApiClient {
    async fn fetch_by_slug(&self, creds: CtaCredentials<'_>, slug: &str) -> Result<Cta, CtaError> {
        let path = format!("/ctas/slug/{}", urlencoding::encode(slug));
        let body = self.get_body(&path, creds).await?;
        decode_cta(slug, &body)
    }

    async fn fetch_site_ctas(&self, creds: CtaCredentials<'_>) -> Result<Vec<Cta>, CtaError> {
        let body = self.get_body("/ctas/wordpress", creds).await?;
        Ok(decode_site_ctas(&body))
    }

    async fn fetch_all_ctas(&self, creds: CtaCredentials<'_>) -> Result<Vec<Cta>, CtaError> {
        let (status, body) = self.get("/ctas/wordpress/all", creds, LISTING_TIMEOUT).await?;
        Ok(decode_site_ctas(&require_ok(status, body)?))
    }

    async fn test_api(&self, creds: CtaCredentials<'_>) -> Result<(), CtaError> {
        let (status, body) = self.get("/ctas/wordpress", creds, LISTING_TIMEOUT).await?;
        require_ok(status, body).map(drop)
    }

    fn lookup_url(&self, slug: &str) -> String {
        self.url(&format!("/ctas/slug/{slug}"))
    }
}

#[async_trait]
impl DisconnectNotifier for ForgeApiClient {
    async fn notify_disconnect(&self, settings: &ConnectionSettings) {
        if settings.site_id().is_none() {
            return;
        }

        let url = self.disconnect_url();
        let path = match Url::parse(&url) {
            Ok(parsed) => parsed.path().to_owned(),
            Err(e) => {
                warn!(error = %e, "invalid disconnect webhook url");
                return;
            }
        };
        let body = br#"{"action":"disconnect"}"#;
        let Some(headers) =
            settings.sign_outgoing("POST", &path, body, chrono::Utc::now().timestamp())
        else {
            return;
        };

        let mut req = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .timeout(WEBHOOK_TIMEOUT)
            .body(body.to_vec());
        for (name, value) in headers.pairs() {
            req = req.header(name, value);
        }

        match req.send().await {
            Ok(resp) => info!(status = %resp.status(), "forge notified of disconnect"),
            Err(e) => warn!(error = %e, "failed to notify forge of disconnect"),
        }
    }
}

/// Resolves host names to their public addresses only.
///
/// Names that resolve solely to loopback, private or link-local addresses
/// fail to resolve, so neither the first request nor a redirect can reach
/// them.
#[derive(Debug, Clone, Copy, Default)]
struct PublicResolver;

impl Resolve for PublicResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(public_addrs(name.as_str().to_owned()))
    }
}

async fn public_addrs(host: String) -> Result<Addrs, Box<dyn std::error::Error + Send + Sync>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
        .await?
        .filter(|addr| is_public_ip(addr.ip()))
        .collect();
    if addrs.is_empty() {
        return Err(format!("{host} has no public address").into());
    }
    Ok(Box::new(addrs.into_iter()))
}

/// Redirects are followed up to ten hops, never to a private address
/// literal. Names are checked by [`PublicResolver`].
fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        let literal_ip = match attempt.url().host() {
            Some(Host::Ipv4(v4)) => Some(IpAddr::V4(v4)),
            Some(Host::Ipv6(v6)) => Some(IpAddr::V6(v6)),
            _ => None,
        };
        if literal_ip.is_some_and(|ip| !is_public_ip(ip)) {
            attempt.error("redirect to a private address")
        } else if attempt.previous().len() >= 10 {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    })
}

/// Downloads remote files over HTTP(S), refusing non-public hosts.
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    http: reqwest::Client,
}

impl HttpMediaFetcher {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .dns_resolver(Arc::new(PublicResolver))
            .redirect(redirect_policy())
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, ContentError> {
        let download = |e: reqwest::Error| ContentError::Download {
            reason: error_chain(&e),
        };
        let resp = self
            .http
            .get(url.as_str())
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(download)?
            .error_for_status()
            .map_err(download)?;
        let bytes = resp.bytes().await.map_err(download)?;
        Ok(bytes.to_vec())
    }
}

/// An error and its sources joined with `: `.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}
