//! Where CTAs come from, and the cache in front of it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::model::Cta;
use crate::connection::{ConnectionKey, ConnectionSettings};
use crate::error::CtaError;

/// How long fetched CTAs are reused.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Identity presented to Forge when fetching CTAs.
#[derive(Debug, Clone, Copy)]
pub struct CtaCredentials<'a> {
    pub site_id: &'a str,
    pub connection_key: &'a ConnectionKey,
}

impl<'a> CtaCredentials<'a> {
    /// `None` unless the site is connected and has a pinned site id.
    #[must_use]
    pub fn from_settings(settings: &'a ConnectionSettings) -> Option<Self> {
        if !settings.is_connected() {
            return None;
        }
        Some(Self {
            site_id: settings.site_id()?,
            connection_key: &settings.connection_key,
        })
    }
}

/// A remote catalogue of CTAs.
#[async_trait]
pub trait CtaSource: Send + Sync {
    /// The CTA with `slug`.
    ///
    /// # Errors
    ///
    /// [`CtaError::NotFound`] when no such CTA exists; other variants when the
    /// lookup itself fails.
    async fn fetch_by_slug(&self, creds: CtaCredentials<'_>, slug: &str) -> Result<Cta, CtaError>;

    /// CTAs shown site-wide (floating bars and popups).
    ///
    /// # Errors
    ///
    /// Returns [`CtaError`] when the lookup fails.
    async fn fetch_site_ctas(&self, creds: CtaCredentials<'_>) -> Result<Vec<Cta>, CtaError>;

    /// Every CTA of the site, inline banners included, for listing.
    ///
    /// # Errors
    ///
    /// [`CtaError::Api`] when the service refuses; other variants when the
    /// lookup itself fails.
    async fn fetch_all_ctas(&self, creds: CtaCredentials<'_>) -> Result<Vec<Cta>, CtaError>;

    /// Check that the service accepts these credentials.
    ///
    /// # Errors
    ///
    /// [`CtaError::Api`] when the service refuses; other variants when it
    /// cannot be reached.
    async fn test_api(&self, creds: CtaCredentials<'_>) -> Result<(), CtaError>;

    /// Where a slug lookup goes, for debug output.
    fn lookup_url(&self, slug: &str) -> String;
}

#[async_trait]
impl<T: CtaSource + ?Sized> CtaSource for Arc<T> {
    async fn fetch_by_slug(&self, creds: CtaCredentials<'_>, slug: &str) -> Result<Cta, CtaError> {
        (**self).fetch_by_slug(creds, slug).await
    }

    async fn fetch_site_ctas(&self, creds: CtaCredentials<'_>) -> Result<Vec<Cta>, CtaError> {
        (**self).fetch_site_ctas(creds).await
    }

    async fn fetch_all_ctas(&self, creds: CtaCredentials<'_>) -> Result<Vec<Cta>, CtaError> {
        (**self).fetch_all_ctas(creds).await
    }

    async fn test_api(&self, creds: CtaCredentials<'_>) -> Result<(), CtaError> {
        (**self).test_api(creds).await
    }

    fn lookup_url(&self, slug: &str) -> String {
        (**self).lookup_url(slug)
    }
}

struct Entry<T> {
    value: T,
    stored: Instant,
}

/// A [`CtaSource`] that remembers successful lookups for a fixed TTL.
///
/// Slug lookups are keyed by slug, site-wide lists by site id. Misses and
/// errors always go back to the inner source, as do full listings and API
/// tests.
pub struct CachedCtaSource<S> {
    inner: S,
    ttl: Duration,
    by_slug: RwLock<HashMap<String, Entry<Cta>>>,
    by_site: RwLock<HashMap<String, Entry<Vec<Cta>>>>,
}

impl<S> std::fmt::Debug for CachedCtaSource<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCtaSource")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<S: CtaSource> CachedCtaSource<S> {
    #[must_use]
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            by_slug: RwLock::new(HashMap::new()),
            by_site: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn fresh<T>(&self, entry: &Entry<T>, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored) < self.ttl
    }

    async fn cached<T: Clone>(&self, map: &RwLock<HashMap<String, Entry<T>>>, key: &str) -> Option<T> {
        let guard = map.read().await;
        let entry = guard.get(key)?;
        self.fresh(entry, Instant::now()).then(|| entry.value.clone())
    }

    /// Drop every cached entry.
    pub async fn clear(&self) {
        self.by_slug.write().await.clear();
        self.by_site.write().await.clear();
        debug!("CTA cache cleared");
    }

    /// Drop expired entries and return how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        {
            let mut slugs = self.by_slug.write().await;
            let before = slugs.len();
            slugs.retain(|_, e| self.fresh(e, now));
            removed += before - slugs.len();
        }
        {
            let mut sites = self.by_site.write().await;
            let before = sites.len();
            sites.retain(|_, e| self.fresh(e, now));
            removed += before - sites.len();
        }
        removed
    }

    /// Number of cached entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.by_slug.read().await.len() + self.by_site.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl<S: CtaSource> CtaSource for CachedCtaSource<S> {
    async fn fetch_by_slug(&self, creds: CtaCredentials<'_>, slug: &str) -> Result<Cta, CtaError> {
        if let Some(cta) = self.cached(&self.by_slug, slug).await {
            return Ok(cta);
        }

        let cta = self.inner.fetch_by_slug(creds, slug).await?;
        self.by_slug.write().await.insert(
            slug.to_owned(),
            Entry {
                value: cta.clone(),
                stored: Instant::now(),
            },
        );
        Ok(cta)
    }

    async fn fetch_site_ctas(&self, creds: CtaCredentials<'_>) -> Result<Vec<Cta>, CtaError> {
        if let Some(ctas) = self.cached(&self.by_site, creds.site_id).await {
            return Ok(ctas);
        }

        let ctas = self.inner.fetch_site_ctas(creds).await?;
        self.by_site.write().await.insert(
            creds.site_id.to_owned(),
            Entry {
                value: ctas.clone(),
                stored: Instant::now(),
            },
        );
        Ok(ctas)
    }

    async fn fetch_all_ctas(&self, creds: CtaCredentials<'_>) -> Result<Vec<Cta>, CtaError> {
        self.inner.fetch_all_ctas(creds).await
    }

    async fn test_api(&self, creds: CtaCredentials<'_>) -> Result<(), CtaError> {
        self.inner.test_api(creds).await
    }

    fn lookup_url(&self, slug: &str) -> String {
        self.inner.lookup_url(slug)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    /// In-memory catalogue that counts lookups.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub ctas: Vec<Cta>,
        pub site: Vec<Cta>,
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    impl FakeSource {
        pub(crate) fn with(ctas: Vec<Cta>, site: Vec<Cta>) -> Self {
            Self {
                ctas,
                site,
                ..Self::default()
            }
        }
    }

    pub(crate) fn cta(id: &str, kind: &str) -> Cta {
        serde_json::from_value(json!({
            "id": id,
            "slug": id,
            "type": kind,
            "content": {"headline": format!("Headline {id}")}
        }))
        .unwrap()
    }

    #[async_trait]
    impl CtaSource for FakeSource {
        async fn fetch_by_slug(&self, _: CtaCredentials<'_>, slug: &str) -> Result<Cta, CtaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CtaError::Request {
                    reason: "unreachable".to_owned(),
                });
            }
            self.ctas
                .iter()
                .find(|c| c.slug == slug)
                .cloned()
                .ok_or_else(|| CtaError::NotFound {
                    slug: slug.to_owned(),
                })
        }

        async fn fetch_site_ctas(&self, _: CtaCredentials<'_>) -> Result<Vec<Cta>, CtaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CtaError::Request {
                    reason: "unreachable".to_owned(),
                });
            }
            Ok(self.site.clone())
        }

        async fn fetch_all_ctas(&self, _: CtaCredentials<'_>) -> Result<Vec<Cta>, CtaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CtaError::Api {
                    status: 403,
                    message: "Invalid connection key".to_owned(),
                });
            }
            Ok(self.ctas.iter().chain(&self.site).cloned().collect())
        }

        async fn test_api(&self, _: CtaCredentials<'_>) -> Result<(), CtaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CtaError::Api {
                    status: 403,
                    message: "Invalid connection key".to_owned(),
                });
            }
            Ok(())
        }

        fn lookup_url(&self, slug: &str) -> String {
            format!("https://forge.test/api/ctas/slug/{slug}")
        }
    }

    fn key() -> ConnectionKey {
        ConnectionKey::new("fk_0123456789abcdef0123456789abcdef")
    }

    #[test]
    fn credentials_require_connection_and_site() {
        let mut settings = ConnectionSettings {
            connection_key: key(),
            connected: true,
            connected_at: None,
            forge_site_id: Some("site-1".to_owned()),
        };
        assert_eq!(CtaCredentials::from_settings(&settings).map(|c| c.site_id), Some("site-1"));

        settings.forge_site_id = Some(String::new());
        assert!(CtaCredentials::from_settings(&settings).is_none());

        settings.forge_site_id = Some("site-1".to_owned());
        settings.connected = false;
        assert!(CtaCredentials::from_settings(&settings).is_none());
    }

    #[tokio::test]
    async fn hits_are_served_from_cache() {
        let cache = CachedCtaSource::new(
            FakeSource::with(vec![cta("promo", "banner")], vec![cta("bar", "floating-bar")]),
            DEFAULT_CACHE_TTL,
        );
        let k = key();
        let creds = CtaCredentials {
            site_id: "s",
            connection_key: &k,
        };

        for _ in 0..3 {
            assert_eq!(cache.fetch_by_slug(creds, "promo").await.unwrap().id, "promo");
            assert_eq!(cache.fetch_site_ctas(creds).await.unwrap().len(), 1);
        }
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.is_empty().await);
        cache.fetch_by_slug(creds, "promo").await.unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn misses_and_errors_are_not_cached() {
        let cache = CachedCtaSource::new(FakeSource::default(), DEFAULT_CACHE_TTL);
        let k = key();
        let creds = CtaCredentials {
            site_id: "s",
            connection_key: &k,
        };
        for _ in 0..2 {
            assert!(matches!(
                cache.fetch_by_slug(creds, "nope").await,
                Err(CtaError::NotFound { .. })
            ));
        }
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty().await);

        let failing = CachedCtaSource::new(
            FakeSource {
                fail: true,
                ..FakeSource::default()
            },
            DEFAULT_CACHE_TTL,
        );
        assert!(failing.fetch_site_ctas(creds).await.is_err());
        assert!(failing.is_empty().await);
    }

    #[tokio::test]
    async fn full_listings_and_api_tests_bypass_the_cache() {
        let cache = CachedCtaSource::new(
            FakeSource::with(vec![cta("inline", "banner")], vec![cta("bar", "floating-bar")]),
            DEFAULT_CACHE_TTL,
        );
        let k = key();
        let creds = CtaCredentials {
            site_id: "s",
            connection_key: &k,
        };
        for _ in 0..2 {
            let ids: Vec<String> = cache
                .fetch_all_ctas(creds)
                .await
                .unwrap()
                .into_iter()
                .map(|c| c.id)
                .collect();
            assert_eq!(ids, ["inline", "bar"]);
            cache.test_api(creds).await.unwrap();
        }
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 4);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched_and_purged() {
        let cache = CachedCtaSource::new(
            FakeSource::with(vec![cta("promo", "banner")], Vec::new()),
            Duration::ZERO,
        );
        let k = key();
        let creds = CtaCredentials {
            site_id: "s",
            connection_key: &k,
        };
        cache.fetch_by_slug(creds, "promo").await.unwrap();
        cache.fetch_by_slug(creds, "promo").await.unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);

        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.is_empty().await);
    }
}
