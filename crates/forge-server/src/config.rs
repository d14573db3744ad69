//! Server configuration for Forge Connector.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `FORGE_*` environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use forge_core::content::{SiteInfo, User};
use forge_core::signing::PLUGIN_VERSION;

/// Default Forge API base URL.
pub const DEFAULT_API_URL: &str = "https://api.gluska.co/api";

/// Default cap on buffered request bodies (32 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Storage backend type.
    pub storage_backend: StorageBackendType,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Base URL of the Forge API, without a trailing slash.
    pub api_url: String,
    /// Site description reported to Forge.
    pub site: SiteInfo,
    /// Seed users. Always contains at least one administrator.
    pub users: Vec<User>,
    /// How long fetched CTAs are reused.
    pub cta_cache_ttl: Duration,
    /// Interval between sweeps of expired CTA cache entries.
    pub cache_sweep_interval: Duration,
    /// Show CTA debug boxes on every shortcode.
    pub debug: bool,
    /// Largest request body accepted on signed routes.
    pub max_body_bytes: usize,
}

/// Supported storage backend types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackendType {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// Redb persistent storage.
    Redb { path: String },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8300)),
            storage_backend: StorageBackendType::Memory,
            log_level: "info".to_owned(),
            api_url: DEFAULT_API_URL.to_owned(),
            site: SiteInfo::default(),
            users: vec![default_admin()],
            cta_cache_ttl: forge_core::cta::DEFAULT_CACHE_TTL,
            cache_sweep_interval: Duration::from_secs(60),
            debug: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

fn default_admin() -> User {
    User {
        id: 1,
        username: "admin".to_owned(),
        name: "Administrator".to_owned(),
        email: String::new(),
        roles: vec!["administrator".to_owned()],
    }
}

/// Parse `login:email:display name` into the seed administrator.
///
/// The display name may itself contain colons. Missing parts fall back to the
/// login.
pub fn parse_admin_user(spec: &str) -> Option<User> {
    let mut parts = spec.splitn(3, ':');
    let login = parts.next().map(str::trim).filter(|s| !s.is_empty())?;
    let email = parts.next().map(str::trim).unwrap_or_default();
    let name = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(login);
    Some(User {
        id: 1,
        username: login.to_owned(),
        name: name.to_owned(),
        email: email.to_owned(),
        roles: vec!["administrator".to_owned()],
    })
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

/// Whole seconds from `raw`, never less than `min`. Unparsable values use
/// `default`.
fn parse_secs(raw: Option<&str>, default: u64, min: u64) -> Duration {
    Duration::from_secs(
        raw.and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
            .max(min),
    )
}

fn env_secs(name: &str, default: u64, min: u64) -> Duration {
    parse_secs(std::env::var(name).ok().as_deref(), default, min)
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT`: port to bind on (binds to `0.0.0.0`)
    /// - `FORGE_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:8300`)
    /// - `FORGE_STORAGE`: `memory` or `redb` (default: `memory`)
    /// - `FORGE_STORAGE_PATH`: path for the redb file (default: `./data/forge.redb`)
    /// - `FORGE_LOG_LEVEL`: log filter (default: `info`)
    /// - `FORGE_API_URL`: Forge API base URL
    /// - `FORGE_SITE_NAME`, `FORGE_SITE_DESCRIPTION`, `FORGE_SITE_URL`,
    ///   `FORGE_HOME_URL`, `FORGE_ADMIN_EMAIL`, `FORGE_LOCALE`,
    ///   `FORGE_TIMEZONE`, `FORGE_TIMEZONE_OFFSET` (seconds east of UTC)
    /// - `FORGE_ADMIN_USER`: seed administrator as `login:email:display name`
    /// - `FORGE_CTA_CACHE_TTL`: seconds (default: `300`)
    /// - `FORGE_CACHE_SWEEP_INTERVAL`: seconds, at least `1` (default: `60`)
    /// - `FORGE_DEBUG`: CTA debug output everywhere (default: `false`)
    /// - `FORGE_MAX_BODY_BYTES`: signed body limit (default: 32 MiB)
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Priority: FORGE_BIND_ADDR > PORT > default 127.0.0.1:8300
        let bind_addr = if let Ok(addr) = std::env::var("FORGE_BIND_ADDR") {
            addr.parse().unwrap_or(defaults.bind_addr)
        } else if let Ok(port_str) = std::env::var("PORT") {
            let port: u16 = port_str.parse().unwrap_or(8300);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            defaults.bind_addr
        };

        let storage_backend = match std::env::var("FORGE_STORAGE")
            .unwrap_or_else(|_| "memory".to_owned())
            .to_lowercase()
            .as_str()
        {
            "redb" => StorageBackendType::Redb {
                path: std::env::var("FORGE_STORAGE_PATH")
                    .unwrap_or_else(|_| "./data/forge.redb".to_owned()),
            },
            _ => StorageBackendType::Memory,
        };

        let log_level = std::env::var("FORGE_LOG_LEVEL").unwrap_or(defaults.log_level);
        let api_url = std::env::var("FORGE_API_URL")
            .map(|u| u.trim_end_matches('/').to_owned())
            .unwrap_or(defaults.api_url);

        let site_defaults = SiteInfo::default();
        let var = |name: &str, fallback: String| std::env::var(name).unwrap_or(fallback);
        let url = var("FORGE_SITE_URL", site_defaults.url);
        let site = SiteInfo {
            name: var("FORGE_SITE_NAME", site_defaults.name),
            description: var("FORGE_SITE_DESCRIPTION", site_defaults.description),
            home: var("FORGE_HOME_URL", url.clone()),
            url,
            admin_email: var("FORGE_ADMIN_EMAIL", site_defaults.admin_email),
            language: var("FORGE_LOCALE", site_defaults.language),
            timezone: var("FORGE_TIMEZONE", site_defaults.timezone),
            platform_version: PLUGIN_VERSION.to_owned(),
            plugin_version: PLUGIN_VERSION.to_owned(),
            multisite: false,
            utc_offset_secs: std::env::var("FORGE_TIMEZONE_OFFSET")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        };

        let mut admin = std::env::var("FORGE_ADMIN_USER")
            .ok()
            .and_then(|spec| parse_admin_user(&spec))
            .unwrap_or_else(default_admin);
        if admin.email.is_empty() {
            admin.email.clone_from(&site.admin_email);
        }

        let max_body_bytes = std::env::var("FORGE_MAX_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        Self {
            bind_addr,
            storage_backend,
            log_level,
            api_url,
            site,
            users: vec![admin],
            cta_cache_ttl: env_secs("FORGE_CTA_CACHE_TTL", 300, 0),
            cache_sweep_interval: env_secs("FORGE_CACHE_SWEEP_INTERVAL", 60, 1),
            debug: env_flag("FORGE_DEBUG"),
            max_body_bytes,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn admin_user_spec() {
        let user = parse_admin_user("jane:jane@example.com:Jane: The Editor").unwrap();
        assert_eq!(user.username, "jane");
        assert_eq!(user.email, "jane@example.com");
        assert_eq!(user.name, "Jane: The Editor");
        assert!(user.is_admin());

        let bare = parse_admin_user("ops").unwrap();
        assert_eq!(bare.name, "ops");
        assert!(bare.email.is_empty());

        assert!(parse_admin_user("  ").is_none());
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8300);
        assert_eq!(config.storage_backend, StorageBackendType::Memory);
        assert_eq!(config.cta_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.max_body_bytes, 32 * 1024 * 1024);
        assert_eq!(config.users.len(), 1);
    }

    #[test]
    fn durations_respect_their_minimum() {
        assert_eq!(parse_secs(Some("0"), 60, 1), Duration::from_secs(1));
        assert_eq!(parse_secs(Some(" 15 "), 60, 1), Duration::from_secs(15));
        assert_eq!(parse_secs(Some("soon"), 60, 1), Duration::from_secs(60));
        assert_eq!(parse_secs(None, 60, 1), Duration::from_secs(60));
        assert_eq!(parse_secs(Some("0"), 300, 0), Duration::ZERO);
    }
}
