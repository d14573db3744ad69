//! Shared application state for the Forge Connector server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`.

use std::sync::Arc;

use forge_core::connection::ConnectionManager;
use forge_core::content::{ContentStore, MediaFetcher};
use forge_core::cta::{CachedCtaSource, CtaSource};
use forge_storage::StorageBackend;

use crate::config::ServerConfig;
use crate::forge_api::{DisconnectNotifier, ForgeApiClient, HttpMediaFetcher};

/// The CTA source used by handlers: any remote source behind the TTL cache.
pub type CtaCache = CachedCtaSource<Arc<dyn CtaSource>>;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Connection settings and request authentication.
    pub connection: Arc<ConnectionManager>,
    /// Posts, media, terms and users.
    pub content: Arc<ContentStore>,
    /// Cached CTA lookups.
    pub ctas: Arc<CtaCache>,
    /// Downloads files for URL uploads.
    pub media_fetcher: Arc<dyn MediaFetcher>,
    /// Receives disconnect notifications.
    pub notifier: Arc<dyn DisconnectNotifier>,
    /// Forge API base URL handed to the CTA tracker.
    pub api_url: String,
    /// Show CTA debug output on every shortcode.
    pub debug: bool,
    /// Largest request body accepted on signed routes.
    pub max_body_bytes: usize,
}

impl AppState {
    /// Wire the production collaborators from `config` over `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the download client cannot be built.
    pub fn new(
        config: &ServerConfig,
        storage: Arc<dyn StorageBackend>,
    ) -> Result<Self, reqwest::Error> {
        let api = Arc::new(ForgeApiClient::new(config.api_url.clone()));
        let source: Arc<dyn CtaSource> = api.clone();
        Ok(Self {
            connection: Arc::new(ConnectionManager::new(Arc::clone(&storage))),
            content: Arc::new(ContentStore::new(
                storage,
                config.site.clone(),
                config.users.clone(),
            )),
            ctas: Arc::new(CachedCtaSource::new(source, config.cta_cache_ttl)),
            media_fetcher: Arc::new(HttpMediaFetcher::new()?),
            notifier: api,
            api_url: config.api_url.clone(),
            debug: config.debug,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("api_url", &self.api_url)
            .field("debug", &self.debug)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}
