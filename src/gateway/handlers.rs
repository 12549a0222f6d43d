//! Route handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Html;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use tracing::{debug, error, info};

use super::response::{
    GatewayError, HealthResponse, MessageRequest, ReceiptRequest, SendResult, StatusResponse,
};
use super::GatewayState;
use crate::destination;
use crate::qr;

/// The two send routes share one contract and differ only in wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendKind {
    /// `POST /send-receipt`.
    Receipt,
    /// `POST /send-message`.
    Message,
}

impl SendKind {
    /// Error text when a required field is absent.
    pub fn missing_fields_error(self) -> &'static str {
        match self {
            Self::Receipt => "Missing phoneNumber or receiptText",
            Self::Message => "Missing phoneNumber or message",
        }
    }

    /// Error text when the adapter fails.
    pub fn failure_error(self) -> &'static str {
        match self {
            Self::Receipt => "Failed to send receipt",
            Self::Message => "Failed to send message",
        }
    }

    /// Confirmation text on success.
    pub fn success_message(self) -> &'static str {
        match self {
            Self::Receipt => "Receipt sent successfully",
            Self::Message => "Message sent successfully",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::Message => "message",
        }
    }
}

/// Current time in the `sentAt`/`timestamp` format (UTC, milliseconds).
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_owned(),
        timestamp: now_rfc3339(),
    })
}

pub(super) async fn status(State(state): State<Arc<GatewayState>>) -> Json<StatusResponse> {
    let current = state.lifecycle.current();
    Json(StatusResponse {
        state: current.name().to_owned(),
        qr_available: current.qr_payload().is_some(),
        detail: current.detail().map(str::to_owned),
    })
}

pub(super) async fn qr_page(
    State(state): State<Arc<GatewayState>>,
) -> Result<Html<String>, GatewayError> {
    let payload = state
        .lifecycle
        .qr_payload()
        .ok_or(GatewayError::QrUnavailable)?;
    let page = qr::render_html(&payload).map_err(|e| GatewayError::QrRender(e.to_string()))?;
    Ok(Html(page))
}

pub(super) async fn send_receipt(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<ReceiptRequest>, JsonRejection>,
) -> Result<Json<SendResult>, GatewayError> {
    let Json(req) = body.map_err(|e| invalid_body(SendKind::Receipt, &e))?;
    forward(&state, SendKind::Receipt, req.phone_number, req.receipt_text).await
}

pub(super) async fn send_message(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<SendResult>, GatewayError> {
    let Json(req) = body.map_err(|e| invalid_body(SendKind::Message, &e))?;
    forward(&state, SendKind::Message, req.phone_number, req.message).await
}

fn invalid_body(kind: SendKind, rejection: &JsonRejection) -> GatewayError {
    debug!(kind = kind.label(), error = %rejection, "rejecting unreadable request body");
    GatewayError::BadRequest {
        error: kind.missing_fields_error().to_owned(),
        details: Some(rejection.body_text()),
    }
}

/// Validate, normalize and hand the message to the adapter. One attempt only.
async fn forward(
    state: &GatewayState,
    kind: SendKind,
    phone_number: Option<String>,
    text: Option<String>,
) -> Result<Json<SendResult>, GatewayError> {
    let (Some(phone_number), Some(text)) = (
        phone_number.filter(|p| !p.is_empty()),
        text.filter(|t| !t.is_empty()),
    ) else {
        return Err(GatewayError::BadRequest {
            error: kind.missing_fields_error().to_owned(),
            details: None,
        });
    };

    let destination = destination::normalize(&phone_number).map_err(|e| {
        GatewayError::BadRequest {
            error: e.to_string(),
            details: None,
        }
    })?;

    info!(kind = kind.label(), jid = %destination, "sending via WhatsApp");
    let outcome = tokio::time::timeout(
        state.send_timeout,
        state.adapter.send_message(&destination, &text),
    )
    .await;

    match outcome {
        Ok(Ok(())) => Ok(Json(SendResult {
            success: true,
            message: kind.success_message().to_owned(),
            phone_number,
            sent_at: now_rfc3339(),
        })),
        Ok(Err(e)) => {
            error!(kind = kind.label(), jid = %destination, error = %e, "send failed");
            Err(GatewayError::SendFailed {
                error: kind.failure_error(),
                details: e.to_string(),
            })
        }
        Err(_) => {
            error!(
                kind = kind.label(),
                jid = %destination,
                timeout_secs = state.send_timeout.as_secs(),
                "send timed out"
            );
            Err(GatewayError::SendTimedOut {
                error: kind.failure_error(),
                timeout: state.send_timeout,
            })
        }
    }
}
