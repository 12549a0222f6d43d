//! Request/response bodies and the error type handlers return.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Body of `POST /send-receipt`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRequest {
    /// Recipient phone number in any human format.
    pub phone_number: Option<String>,
    /// Receipt text to send.
    pub receipt_text: Option<String>,
}

/// Body of `POST /send-message`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    /// Recipient phone number in any human format.
    pub phone_number: Option<String>,
    /// Message text to send.
    pub message: Option<String>,
}

/// Successful send.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    /// Always `true`.
    pub success: bool,
    /// Human-readable confirmation.
    pub message: String,
    /// The phone number exactly as submitted.
    pub phone_number: String,
    /// RFC 3339 timestamp of adapter acceptance.
    pub sent_at: String,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    /// RFC 3339 timestamp of the check.
    pub timestamp: String,
}

/// Body of `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Lifecycle state name.
    pub state: String,
    /// Whether `GET /qr` would currently have something to show.
    pub qr_available: bool,
    /// Disconnect reason or auth failure detail, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short error description.
    pub error: String,
    /// Underlying cause, passed through from the adapter where applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Every failure a handler can produce, mapped to a status code.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed or incomplete request.
    #[error("{error}")]
    BadRequest {
        /// Client-facing description.
        error: String,
        /// Parser detail, if any.
        details: Option<String>,
    },

    /// `GET /qr` with no challenge outstanding.
    #[error("no QR code available: already authenticated or not yet issued")]
    QrUnavailable,

    /// A pending challenge could not be rendered.
    #[error("failed to render QR code: {0}")]
    QrRender(String),

    /// The adapter rejected or failed the send.
    #[error("{error}: {details}")]
    SendFailed {
        /// Client-facing description.
        error: &'static str,
        /// Adapter message, verbatim.
        details: String,
    },

    /// The adapter did not settle within the send timeout.
    #[error("{error}: timed out after {timeout:?}")]
    SendTimedOut {
        /// Client-facing description.
        error: &'static str,
        /// The configured limit.
        timeout: Duration,
    },
}

impl GatewayError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } | Self::QrUnavailable => StatusCode::BAD_REQUEST,
            Self::QrRender(_) | Self::SendFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SendTimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn body(self) -> ErrorBody {
        match self {
            Self::BadRequest { error, details } => ErrorBody { error, details },
            Self::QrUnavailable => ErrorBody {
                error: Self::QrUnavailable.to_string(),
                details: None,
            },
            Self::QrRender(details) => ErrorBody {
                error: "Failed to render QR code".to_owned(),
                details: Some(details),
            },
            Self::SendFailed { error, details } => ErrorBody {
                error: error.to_owned(),
                details: Some(details),
            },
            Self::SendTimedOut { error, timeout } => ErrorBody {
                error: error.to_owned(),
                details: Some(format!(
                    "adapter did not respond within {}s",
                    timeout.as_secs()
                )),
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(self.body())).into_response()
    }
}
