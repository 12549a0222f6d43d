//! Messaging client adapter: the seam between the gateway and WhatsApp.
//!
//! The gateway never speaks the WhatsApp protocol itself. Everything behind
//! [`MessagingAdapter`] (session establishment, device linking, transport,
//! reconnection) belongs to the adapter. The production implementation is
//! [`bridge::BridgeAdapter`], an HTTP client for a WhatsApp Web bridge
//! sidecar.

pub mod bridge;
pub mod events;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::destination::Destination;

/// Errors from a messaging adapter.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The bridge could not be reached or the response could not be read.
    #[error("bridge request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The adapter refused the operation. Carries its message verbatim.
    #[error("{0}")]
    Rejected(String),

    /// The adapter has already been destroyed.
    #[error("adapter has been destroyed")]
    Destroyed,
}

/// A lifecycle event emitted by the adapter.
///
/// Doubles as the wire format of the bridge's `/events/poll` endpoint, which
/// returns a JSON array of objects tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdapterEvent {
    /// A login QR challenge was issued (or rotated).
    Qr {
        /// Raw challenge payload to encode as a QR code.
        qr: String,
    },
    /// The session is authenticated and able to send.
    Ready,
    /// The session was closed.
    Disconnected {
        /// Human-readable reason, if available.
        #[serde(default)]
        reason: Option<String>,
    },
    /// Authentication was rejected.
    AuthFailure {
        /// Human-readable detail, if available.
        #[serde(default)]
        message: Option<String>,
    },
}

/// Capability set the gateway needs from a messaging client.
#[async_trait]
pub trait MessagingAdapter: Send + Sync {
    /// Begin session establishment.
    ///
    /// Returns once startup has been kicked off; progress is reported through
    /// `events`. Implementations stop emitting when the receiver is dropped.
    async fn initialize(&self, events: mpsc::Sender<AdapterEvent>) -> Result<(), AdapterError>;

    /// Send a text message to a normalized destination.
    ///
    /// Resolves when the adapter accepted the message for delivery.
    async fn send_message(&self, destination: &Destination, text: &str)
        -> Result<(), AdapterError>;

    /// Release every resource held by the adapter.
    ///
    /// Called once during shutdown. Further calls must be harmless.
    async fn destroy(&self) -> Result<(), AdapterError>;
}
