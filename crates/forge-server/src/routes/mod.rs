//! HTTP route handlers for Forge Connector.
//!
//! Routes are organized by subsystem:
//! - `connection`: connect handshake, health, status, disconnect
//! - `site`: sync snapshot, users, post types, post statuses
//! - `posts`: post CRUD and existence checks
//! - `media`: attachment CRUD and uploads
//! - `taxonomy`: categories and tags
//! - `cta`: CTA rendering, listing and cache control
//! - `uploads`: serving stored media files
//! - `assets`: the CTA tracker script

pub mod assets;
pub mod connection;
pub mod cta;
pub mod media;
pub mod posts;
pub mod site;
pub mod taxonomy;
pub mod uploads;

use axum::body::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;

/// Parse a JSON request body. An empty body reads as the default value.
pub(crate) fn json_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::bad_request("invalid_json", format!("invalid JSON body: {e}")))
}

/// Parse a numeric path id. Anything but digits matches no route.
pub(crate) fn path_id(raw: &str) -> Result<u64, AppError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::NotFound {
            code: "rest_no_route",
            message: "No route was found matching the URL and request method.".to_owned(),
        });
    }
    raw.parse().map_err(|_| AppError::NotFound {
        code: "not_found",
        message: format!("no object with id {raw}"),
    })
}

/// Body of a delete request.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeleteBody {
    #[serde(default)]
    force: Value,
}

impl DeleteBody {
    pub(crate) fn force(&self) -> bool {
        match &self.force {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty() && s != "0" && s != "false",
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
            Value::Null => false,
        }
    }
}
