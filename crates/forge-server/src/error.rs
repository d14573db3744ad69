//! HTTP error types for the Forge Connector server.
//!
//! Maps domain errors from `forge-core` into HTTP responses. Every error
//! produces a JSON body `{"code", "message", "data": {"status"}}` with a
//! stable machine-readable `code`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use forge_core::error::{AuthError, ConnectError, ContentError, CtaError, SettingsError};

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Authentication failed.
    Unauthorized { code: &'static str, message: String },
    /// The request was understood but refused.
    Forbidden { code: &'static str, message: String },
    /// Requested resource not found.
    NotFound { code: &'static str, message: String },
    /// Client sent invalid input.
    BadRequest { code: &'static str, message: String },
    /// The resource already exists.
    Conflict { code: &'static str, message: String },
    /// The request body is larger than allowed.
    PayloadTooLarge(String),
    /// Internal server error.
    Internal { code: &'static str, message: String },
}

#[derive(Serialize)]
struct ErrorData {
    status: u16,
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    data: ErrorData,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }

    fn parts(self) -> (StatusCode, &'static str, String) {
        match self {
            Self::Unauthorized { code, message } => (StatusCode::UNAUTHORIZED, code, message),
            Self::Forbidden { code, message } => (StatusCode::FORBIDDEN, code, message),
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message),
            Self::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            Self::Conflict { code, message } => (StatusCode::CONFLICT, code, message),
            Self::PayloadTooLarge(message) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", message)
            }
            Self::Internal { code, message } => {
                (StatusCode::INTERNAL_SERVER_ERROR, code, message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, message = %message, "request failed");
        }

        let body = ErrorBody {
            code,
            message,
            data: ErrorData {
                status: status.as_u16(),
            },
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<SettingsError> for AppError {
    fn from(err: SettingsError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let code = match err {
            AuthError::NotConfigured => "forge_not_configured",
            AuthError::MissingHeaders => "forge_missing_auth",
            AuthError::Expired { .. } => "forge_expired_request",
            AuthError::InvalidSignature => "forge_invalid_signature",
            AuthError::SiteMismatch => "forge_site_mismatch",
            AuthError::Settings(inner) => return inner.into(),
        };
        Self::Unauthorized {
            code,
            message: err.to_string(),
        }
    }
}

impl From<ConnectError> for AppError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::AlreadyConnected => Self::Forbidden {
                code: "forge_already_connected",
                message: err.to_string(),
            },
            ConnectError::InvalidConnectionKey => Self::Forbidden {
                code: "forge_invalid_connection_key",
                message: err.to_string(),
            },
            ConnectError::MissingKey => Self::bad_request("missing_key", err.to_string()),
            ConnectError::InvalidKeyFormat => Self::bad_request("invalid_key", err.to_string()),
            ConnectError::NotConnected => Self::bad_request("not_connected", err.to_string()),
            ConnectError::Settings(inner) => inner.into(),
        }
    }
}

impl From<ContentError> for AppError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::NotFound { .. } => Self::NotFound {
                code: "not_found",
                message: err.to_string(),
            },
            ContentError::InvalidInput { code, message } => Self::BadRequest { code, message },
            ContentError::Conflict { code, message } => Self::Conflict { code, message },
            ContentError::Download { .. } => Self::Internal {
                code: "download_error",
                message: err.to_string(),
            },
            ContentError::Storage(_) | ContentError::Corrupt { .. } => {
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<CtaError> for AppError {
    fn from(err: CtaError) -> Self {
        match err {
            CtaError::NotFound { .. } => Self::NotFound {
                code: "cta_not_found",
                message: err.to_string(),
            },
            CtaError::Request { .. } | CtaError::Decode { .. } => Self::Internal {
                code: "forge_api_error",
                message: err.to_string(),
            },
            CtaError::Api { .. } => Self::Internal {
                code: "api_error",
                message: err.to_string(),
            },
        }
    }
}
