//! Connection state between this site and Forge.
//!
//! A single settings record at [`SETTINGS_KEY`] holds the shared connection
//! key, whether the site is connected, when it connected, and the pinned
//! Forge site id. The [`ConnectionManager`] owns every read-modify-write of
//! that record and runs the request authentication pipeline.
//!
//! # Security model
//!
//! - The connection key never appears in `Debug` output or logs and is
//!   zeroized when dropped.
//! - Keys are compared in constant time.
//! - The first authenticated request that names a site id pins it; later
//!   requests naming a different site are rejected.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use forge_storage::StorageBackend;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AuthError, ConnectError, SettingsError};
use crate::signing::{self, SignedHeaders};

/// Storage key of the settings record.
pub const SETTINGS_KEY: &str = "sys/connection";

/// Required prefix of every connection key.
pub const KEY_PREFIX: &str = "fk_";

/// Minimum total key length, prefix included.
pub const MIN_KEY_LEN: usize = 35;

/// A shared secret used to sign requests. Zeroized on drop.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct ConnectionKey(String);

impl ConnectionKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Constant-time equality with a candidate key.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }

    /// Generate a fresh key: `fk_` followed by 32 random alphanumerics.
    #[must_use]
    pub fn generate() -> Self {
        let body = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{KEY_PREFIX}{body}"))
    }
}

impl std::fmt::Debug for ConnectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("ConnectionKey(<empty>)")
        } else {
            f.write_str("ConnectionKey([REDACTED])")
        }
    }
}

/// Whether `key` looks like a Forge connection key.
#[must_use]
pub fn validate_key_format(key: &str) -> bool {
    let Some(body) = key.strip_prefix(KEY_PREFIX) else {
        return false;
    };
    key.len() >= MIN_KEY_LEN && !body.is_empty() && body.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// The persisted settings record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default)]
    pub connection_key: ConnectionKey,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub connected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub forge_site_id: Option<String>,
}

impl ConnectionSettings {
    /// Connected with a key on file.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected && !self.connection_key.is_empty()
    }

    /// The pinned site id, ignoring empty strings.
    #[must_use]
    pub fn site_id(&self) -> Option<&str> {
        self.forge_site_id.as_deref().filter(|s| !s.is_empty())
    }

    /// Sign an outgoing request with the stored key. `None` without a key.
    #[must_use]
    pub fn sign_outgoing(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        now: i64,
    ) -> Option<SignedHeaders> {
        if self.connection_key.is_empty() {
            return None;
        }
        Some(SignedHeaders::build(
            self.connection_key.as_bytes(),
            self.site_id(),
            method,
            path,
            body,
            now,
        ))
    }
}

/// Public view of the connection, safe to return over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub connected_at: Option<DateTime<Utc>>,
    pub forge_site_id: Option<String>,
    pub has_key: bool,
}

/// The authentication-relevant parts of an incoming request.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    pub method: &'a str,
    /// Canonical path, e.g. `/forge/v1/posts/12`.
    pub path: &'a str,
    pub body: &'a [u8],
    pub signature: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub site_id: Option<&'a str>,
}

/// Owns the settings record and runs the auth pipeline.
pub struct ConnectionManager {
    storage: Arc<dyn StorageBackend>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager").finish_non_exhaustive()
    }
}

impl ConnectionManager {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Load the settings record. A missing record reads as defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if storage fails or the record is corrupt.
    pub async fn settings(&self) -> Result<ConnectionSettings, SettingsError> {
        match self.storage.get(SETTINGS_KEY).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| SettingsError::Corrupt {
                reason: e.to_string(),
            }),
            None => Ok(ConnectionSettings::default()),
        }
    }

    async fn save(&self, settings: &ConnectionSettings) -> Result<(), SettingsError> {
        let bytes = serde_json::to_vec(settings).map_err(|e| SettingsError::Corrupt {
            reason: e.to_string(),
        })?;
        self.storage.put(SETTINGS_KEY, &bytes).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`SettingsError`] if the record cannot be read.
    pub async fn is_connected(&self) -> Result<bool, SettingsError> {
        Ok(self.settings().await?.is_connected())
    }

    /// # Errors
    ///
    /// Returns [`SettingsError`] if the record cannot be read.
    pub async fn status(&self) -> Result<ConnectionStatus, SettingsError> {
        let settings = self.settings().await?;
        Ok(ConnectionStatus {
            connected: settings.connected,
            connected_at: settings.connected_at,
            forge_site_id: settings.forge_site_id.clone(),
            has_key: !settings.connection_key.is_empty(),
        })
    }

    /// Record a successful handshake. An empty site id is stored as none.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the record cannot be written.
    pub async fn store_connection(
        &self,
        key: ConnectionKey,
        site_id: Option<&str>,
    ) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().await;
        let settings = ConnectionSettings {
            connection_key: key,
            connected: true,
            connected_at: Some(Utc::now()),
            forge_site_id: site_id.filter(|s| !s.is_empty()).map(str::to_owned),
        };
        self.save(&settings).await?;
        info!(site_id = ?settings.forge_site_id, "connection stored");
        Ok(())
    }

    /// Forget the connection entirely.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the record cannot be written.
    pub async fn disconnect(&self) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().await;
        self.save(&ConnectionSettings::default()).await?;
        info!("connection cleared");
        Ok(())
    }

    /// Decide whether a connect handshake may proceed.
    ///
    /// An unconnected site accepts anyone. A connected site only accepts a
    /// handshake carrying the key it already holds.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::AlreadyConnected`] or
    /// [`ConnectError::InvalidConnectionKey`] when refused.
    pub async fn authorize_connect(&self, provided_key: &str) -> Result<(), ConnectError> {
        let settings = self.settings().await?;
        if !settings.is_connected() {
            return Ok(());
        }
        if provided_key.is_empty() {
            warn!("connect refused: site already connected");
            return Err(ConnectError::AlreadyConnected);
        }
        if !settings.connection_key.matches(provided_key) {
            warn!("connect refused: key does not match existing connection");
            return Err(ConnectError::InvalidConnectionKey);
        }
        Ok(())
    }

    /// Run the connect handshake: validate the key and store it.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::MissingKey`] or
    /// [`ConnectError::InvalidKeyFormat`] for a bad key.
    pub async fn connect(&self, key: &str, site_id: Option<&str>) -> Result<(), ConnectError> {
        if key.is_empty() {
            return Err(ConnectError::MissingKey);
        }
        if !validate_key_format(key) {
            return Err(ConnectError::InvalidKeyFormat);
        }
        self.store_connection(ConnectionKey::new(key), site_id)
            .await?;
        Ok(())
    }

    /// Authenticate a signed request at unix time `now`.
    ///
    /// Checks run in a fixed order: key configured, headers present,
    /// timestamp fresh, signature valid, site id consistent. A site id seen
    /// on a valid request is pinned when none is stored yet.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] of the first failing check.
    pub async fn validate_request(
        &self,
        request: &SignedRequest<'_>,
        now: i64,
    ) -> Result<(), AuthError> {
        let settings = self.settings().await?;
        if settings.connection_key.is_empty() {
            return Err(AuthError::NotConfigured);
        }

        let signature = request.signature.filter(|s| !s.is_empty());
        let timestamp = request.timestamp.filter(|s| !s.is_empty());
        let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
            return Err(AuthError::MissingHeaders);
        };

        let request_time = signing::parse_timestamp(timestamp);
        if !signing::check_freshness(request_time, now) {
            let skew = signing::clock_skew(request_time, now);
            warn!(skew, "rejected expired request");
            return Err(AuthError::Expired {
                timestamp: request_time,
                skew,
            });
        }

        if !signing::verify(
            settings.connection_key.as_bytes(),
            request.method,
            request.path,
            timestamp,
            request.body,
            signature,
        ) {
            warn!(method = request.method, path = request.path, "rejected invalid signature");
            return Err(AuthError::InvalidSignature);
        }

        let Some(site_id) = request.site_id.filter(|s| !s.is_empty()) else {
            return Ok(());
        };
        match settings.site_id() {
            Some(stored) if stored != site_id => {
                warn!(site_id, "rejected request for a different site");
                Err(AuthError::SiteMismatch)
            }
            Some(_) => Ok(()),
            None => self.pin_site_id(site_id).await,
        }
    }

    async fn pin_site_id(&self, site_id: &str) -> Result<(), AuthError> {
        let _guard = self.write_lock.lock().await;
        // Re-read under the lock; another request may have pinned first.
        let mut settings = self.settings().await?;
        match settings.site_id() {
            Some(stored) if stored != site_id => return Err(AuthError::SiteMismatch),
            Some(_) => return Ok(()),
            None => {}
        }
        settings.forge_site_id = Some(site_id.to_owned());
        self.save(&settings).await?;
        info!(site_id, "pinned forge site id");
        Ok(())
    }

    /// Sign an outgoing request. `None` when no key is stored.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the record cannot be read.
    pub async fn sign_outgoing(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        now: i64,
    ) -> Result<Option<SignedHeaders>, SettingsError> {
        Ok(self.settings().await?.sign_outgoing(method, path, body, now))
    }

    /// Check that a usable key is on file.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::NotConnected`] without a key and
    /// [`ConnectError::InvalidKeyFormat`] when the stored key is malformed.
    pub async fn test_connection(&self) -> Result<ConnectionStatus, ConnectError> {
        let settings = self.settings().await?;
        if settings.connection_key.is_empty() {
            return Err(ConnectError::NotConnected);
        }
        if !validate_key_format(settings.connection_key.as_str()) {
            return Err(ConnectError::InvalidKeyFormat);
        }
        Ok(self.status().await?)
    }
}
