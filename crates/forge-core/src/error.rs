//! Error types for `forge-core`.
//!
//! Each domain has its own enum. Authentication errors never carry key
//! material or the expected signature, only what the caller sent.

use forge_storage::StorageError;

/// Errors reading or writing the persisted connection settings record.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The storage backend failed.
    #[error("settings storage error: {0}")]
    Storage(#[from] StorageError),

    /// The stored record could not be decoded or encoded.
    #[error("settings record is corrupt: {reason}")]
    Corrupt { reason: String },
}

/// Errors from authenticating a signed request.
///
/// The variants are checked in declaration order; the first failing check
/// wins.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No connection key is stored.
    #[error("connector is not configured: no connection key stored")]
    NotConfigured,

    /// The signature or timestamp header is missing or empty.
    #[error("missing authentication headers")]
    MissingHeaders,

    /// The timestamp is outside the accepted window.
    #[error("request expired: timestamp {timestamp} is {skew}s away from server time")]
    Expired { timestamp: i64, skew: u64 },

    /// The signature does not match the request.
    #[error("invalid request signature")]
    InvalidSignature,

    /// The request names a different site than the one pinned.
    #[error("site id mismatch")]
    SiteMismatch,

    /// The settings record could not be read or updated.
    #[error("auth settings error: {0}")]
    Settings(#[from] SettingsError),
}

/// Errors from the connect handshake and connection management.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Already connected and no key was provided to prove ownership.
    #[error("site is already connected; disconnect first or provide the existing key")]
    AlreadyConnected,

    /// Already connected and the provided key differs from the stored one.
    #[error("connection key does not match the existing connection")]
    InvalidConnectionKey,

    /// The handshake carried no key.
    #[error("connection key is required")]
    MissingKey,

    /// The key does not look like a Forge connection key.
    #[error("invalid connection key format")]
    InvalidKeyFormat,

    /// There is no stored connection to test.
    #[error("not connected")]
    NotConnected,

    /// The settings record could not be read or updated.
    #[error("connect settings error: {0}")]
    Settings(#[from] SettingsError),
}

/// Errors from the content store.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// The requested object does not exist (or is of the wrong kind).
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: u64 },

    /// The input was rejected. `code` is a stable machine-readable code.
    #[error("{message}")]
    InvalidInput { code: &'static str, message: String },

    /// The object would collide with an existing one.
    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    /// A remote file could not be downloaded.
    #[error("download failed: {reason}")]
    Download { reason: String },

    /// The storage backend failed.
    #[error("content storage error: {0}")]
    Storage(#[from] StorageError),

    /// A stored record could not be decoded or encoded.
    #[error("corrupt record at '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

impl ContentError {
    pub(crate) fn invalid(code: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            code,
            message: message.into(),
        }
    }
}

/// Errors from fetching CTAs.
#[derive(Debug, thiserror::Error)]
pub enum CtaError {
    /// The remote service has no CTA for this slug.
    #[error("CTA not found: {slug}")]
    NotFound { slug: String },

    /// The request to the remote service failed.
    #[error("CTA request failed: {reason}")]
    Request { reason: String },

    /// The response could not be decoded.
    #[error("CTA response could not be decoded: {reason}")]
    Decode { reason: String },

    /// The remote service answered with an error status. `message` is its
    /// `error` field when it sent one.
    #[error("{message}")]
    Api { status: u16, message: String },
}
