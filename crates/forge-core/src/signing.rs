//! HMAC request signing.
//!
//! Every authenticated request between the connector and Forge carries an
//! HMAC-SHA256 signature over a canonical string:
//!
//! ```text
//! METHOD \n PATH \n TIMESTAMP \n BODY
//! ```
//!
//! The timestamp is signed exactly as it appears in the header, and the body
//! is appended raw. Signatures are lowercase hex.
//!
//! # Security model
//!
//! - Requests older or newer than [`TIMESTAMP_TOLERANCE_SECS`] are rejected.
//! - Signature comparison uses `subtle::ConstantTimeEq`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex signature.
pub const SIGNATURE_HEADER: &str = "X-Forge-Signature";
/// Header carrying the unix timestamp the signature binds.
pub const TIMESTAMP_HEADER: &str = "X-Forge-Timestamp";
/// Header carrying the Forge site id.
pub const SITE_ID_HEADER: &str = "X-Forge-Site-ID";
/// Header carrying the connector version on outgoing requests.
pub const PLUGIN_VERSION_HEADER: &str = "X-Forge-Plugin-Version";

/// Maximum allowed distance between the request timestamp and server time.
pub const TIMESTAMP_TOLERANCE_SECS: u64 = 300;

/// Version reported to Forge.
pub const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the canonical byte string that gets signed.
#[must_use]
pub fn string_to_sign(method: &str, path: &str, timestamp: &str, body: &[u8]) -> Vec<u8> {
    let mut out =
        Vec::with_capacity(method.len() + path.len() + timestamp.len() + body.len() + 3);
    out.extend_from_slice(method.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(path.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(timestamp.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(body);
    out
}

/// Sign a request and return the lowercase hex signature.
#[must_use]
#[allow(clippy::missing_panics_doc)]
pub fn sign(key: &[u8], method: &str, path: &str, timestamp: &str, body: &[u8]) -> String {
    #[allow(clippy::expect_used)]
    let mut mac = HmacSha256::new_from_slice(key)
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(&string_to_sign(method, path, timestamp, body));
    hex::encode(mac.finalize().into_bytes())
}

/// Recompute the signature and compare it with `provided` in constant time.
///
/// A length mismatch is a mismatch.
#[must_use]
pub fn verify(
    key: &[u8],
    method: &str,
    path: &str,
    timestamp: &str,
    body: &[u8],
    provided: &str,
) -> bool {
    let expected = sign(key, method, path, timestamp, body);
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Parse a timestamp header the lenient way: surrounding whitespace and an
/// optional sign, then leading digits. Anything without leading digits is 0,
/// and out-of-range values saturate.
#[must_use]
pub fn parse_timestamp(raw: &str) -> i64 {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        let digit = i64::from(b - b'0');
        value = value.saturating_mul(10);
        value = if negative {
            value.saturating_sub(digit)
        } else {
            value.saturating_add(digit)
        };
    }
    value
}

/// Seconds between `timestamp` and `now`.
#[must_use]
pub fn clock_skew(timestamp: i64, now: i64) -> u64 {
    now.abs_diff(timestamp)
}

/// Whether `timestamp` is within [`TIMESTAMP_TOLERANCE_SECS`] of `now`.
#[must_use]
pub fn check_freshness(timestamp: i64, now: i64) -> bool {
    clock_skew(timestamp, now) <= TIMESTAMP_TOLERANCE_SECS
}

/// The header set attached to a request sent to Forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub signature: String,
    pub timestamp: String,
    /// Empty when no site id is known yet.
    pub site_id: String,
    pub plugin_version: String,
}

impl SignedHeaders {
    /// Sign `method path body` at time `now`.
    #[must_use]
    pub fn build(
        key: &[u8],
        site_id: Option<&str>,
        method: &str,
        path: &str,
        body: &[u8],
        now: i64,
    ) -> Self {
        let timestamp = now.to_string();
        Self {
            signature: sign(key, method, path, &timestamp, body),
            timestamp,
            site_id: site_id.unwrap_or_default().to_owned(),
            plugin_version: PLUGIN_VERSION.to_owned(),
        }
    }

    /// Header name/value pairs in a fixed order.
    #[must_use]
    pub fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            (SIGNATURE_HEADER, self.signature.as_str()),
            (TIMESTAMP_HEADER, self.timestamp.as_str()),
            (SITE_ID_HEADER, self.site_id.as_str()),
            (PLUGIN_VERSION_HEADER, self.plugin_version.as_str()),
        ]
    }
}
