//! HTTP gateway: routes, shared state and server lifecycle.

pub mod handlers;
pub mod response;
pub mod server;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;

use crate::adapter::MessagingAdapter;
use crate::lifecycle::LifecycleHandle;
use crate::qr::QrDelivery;

/// State shared by every handler.
#[derive(Clone)]
pub struct GatewayState {
    /// Adapter sends are forwarded to.
    pub adapter: Arc<dyn MessagingAdapter>,
    /// Read-only view of the adapter lifecycle.
    pub lifecycle: LifecycleHandle,
    /// Upper bound on a single adapter send.
    pub send_timeout: Duration,
}

/// Build the gateway router.
///
/// `GET /qr` is only mounted when QR delivery is [`QrDelivery::Endpoint`].
pub fn build_router(state: Arc<GatewayState>, qr_delivery: QrDelivery) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/send-receipt", post(handlers::send_receipt))
        .route("/send-message", post(handlers::send_message));

    if qr_delivery.serves_endpoint() {
        router = router.route("/qr", get(handlers::qr_page));
    }

    router.with_state(state)
}
