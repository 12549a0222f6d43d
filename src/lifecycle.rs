//! Adapter lifecycle tracking.
//!
//! The tracker is the single writer of the process-wide [`LifecycleState`].
//! It consumes [`AdapterEvent`]s from the adapter's channel and publishes
//! each new state through a `watch` channel; request handlers only ever see
//! the read side via [`LifecycleHandle`].

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::adapter::AdapterEvent;
use crate::qr::QrDelivery;

/// Connection and authentication status of the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Startup in progress, nothing reported yet.
    #[default]
    Initializing,
    /// Waiting for the companion device to scan a QR challenge.
    QrPending {
        /// Current challenge payload.
        payload: String,
    },
    /// Authenticated and able to send.
    Ready,
    /// The session was closed.
    Disconnected {
        /// Reason reported by the adapter, if any.
        reason: Option<String>,
    },
    /// Authentication was rejected.
    AuthFailed {
        /// Detail reported by the adapter, if any.
        message: Option<String>,
    },
}

impl LifecycleState {
    /// State after `event`.
    ///
    /// Events are trusted verbatim: the previous state plays no part, so a
    /// stray `ready` before any `qr` is accepted.
    pub fn after(event: AdapterEvent) -> Self {
        match event {
            AdapterEvent::Qr { qr } => Self::QrPending { payload: qr },
            AdapterEvent::Ready => Self::Ready,
            AdapterEvent::Disconnected { reason } => Self::Disconnected { reason },
            AdapterEvent::AuthFailure { message } => Self::AuthFailed { message },
        }
    }

    /// Stable snake_case name used in logs and the status endpoint.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::QrPending { .. } => "qr_pending",
            Self::Ready => "ready",
            Self::Disconnected { .. } => "disconnected",
            Self::AuthFailed { .. } => "auth_failed",
        }
    }

    /// The pending QR payload, if a challenge is outstanding.
    pub fn qr_payload(&self) -> Option<&str> {
        match self {
            Self::QrPending { payload } => Some(payload),
            _ => None,
        }
    }

    /// Extra human-readable detail (disconnect reason, auth failure message).
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Disconnected { reason } => reason.as_deref(),
            Self::AuthFailed { message } => message.as_deref(),
            _ => None,
        }
    }
}

/// Read-only view of the lifecycle state.
#[derive(Debug, Clone)]
pub struct LifecycleHandle {
    rx: watch::Receiver<LifecycleState>,
}

impl LifecycleHandle {
    /// Snapshot of the current state.
    pub fn current(&self) -> LifecycleState {
        self.rx.borrow().clone()
    }

    /// The pending QR payload, if any.
    pub fn qr_payload(&self) -> Option<String> {
        self.rx.borrow().qr_payload().map(str::to_owned)
    }

    /// Wait until the state satisfies `predicate`.
    ///
    /// Returns `None` if the tracker is gone before that happens.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&LifecycleState) -> bool,
    ) -> Option<LifecycleState> {
        self.rx
            .wait_for(predicate)
            .await
            .ok()
            .map(|state| state.clone())
    }
}

/// Applies adapter events to the lifecycle state.
pub struct LifecycleTracker {
    tx: watch::Sender<LifecycleState>,
    delivery: QrDelivery,
}

impl LifecycleTracker {
    /// Create a tracker in the `Initializing` state and its read handle.
    pub fn new(delivery: QrDelivery) -> (Self, LifecycleHandle) {
        let (tx, rx) = watch::channel(LifecycleState::Initializing);
        (Self { tx, delivery }, LifecycleHandle { rx })
    }

    /// Another read handle onto the same state.
    pub fn handle(&self) -> LifecycleHandle {
        LifecycleHandle {
            rx: self.tx.subscribe(),
        }
    }

    /// Apply a single event and publish the resulting state.
    pub fn apply(&self, event: AdapterEvent) {
        let next = LifecycleState::after(event);
        match &next {
            LifecycleState::QrPending { payload } => {
                info!("QR code received, scan it with WhatsApp on your phone");
                self.delivery.deliver(payload);
            }
            LifecycleState::Ready => info!("WhatsApp client is ready"),
            LifecycleState::Disconnected { reason } => warn!(
                reason = reason.as_deref().unwrap_or("unknown"),
                "WhatsApp client disconnected"
            ),
            LifecycleState::AuthFailed { message } => error!(
                detail = message.as_deref().unwrap_or("none"),
                "WhatsApp authentication failed"
            ),
            LifecycleState::Initializing => {}
        }
        self.tx.send_replace(next);
    }

    /// Consume events until the adapter side of the channel closes.
    pub async fn run(self, mut events: mpsc::Receiver<AdapterEvent>) {
        while let Some(event) = events.recv().await {
            self.apply(event);
        }
        info!(state = self.tx.borrow().name(), "adapter event channel closed");
    }
}
