//! Server startup and scoped teardown.
//!
//! Start order: lifecycle tracker, adapter initialization (in the
//! background), HTTP listener. The listener does not wait for the adapter;
//! sends issued before it is ready fail with the adapter's own error.
//! On shutdown the HTTP server drains first, then the adapter is destroyed
//! exactly once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::{build_router, GatewayState};
use crate::adapter::MessagingAdapter;
use crate::config::GatewayConfig;
use crate::lifecycle::LifecycleTracker;

/// Capacity of the adapter → tracker event channel.
const EVENT_BUFFER: usize = 32;

/// How long to wait for the tracker to drain after the adapter is destroyed.
const TRACKER_DRAIN_SECS: u64 = 5;

/// Bind the configured address and run until SIGINT.
///
/// # Errors
///
/// Returns an error if the address is invalid, cannot be bound, or the HTTP
/// server fails.
pub async fn run(config: &GatewayConfig, adapter: Arc<dyn MessagingAdapter>) -> anyhow::Result<()> {
    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    serve_on(listener, config, adapter, shutdown_signal()).await
}

/// Run the gateway on an already-bound listener until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the HTTP server fails.
pub async fn serve_on<F>(
    listener: TcpListener,
    config: &GatewayConfig,
    adapter: Arc<dyn MessagingAdapter>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let qr_delivery = config.qr.delivery;
    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
    let (tracker, lifecycle) = LifecycleTracker::new(qr_delivery);
    let tracker_task = tokio::spawn(tracker.run(event_rx));

    info!("starting WhatsApp adapter");
    let init_adapter = Arc::clone(&adapter);
    let init_task = tokio::spawn(async move {
        if let Err(e) = init_adapter.initialize(event_tx).await {
            error!(error = %e, "adapter initialization failed, HTTP endpoints stay up");
        }
    });

    let state = Arc::new(GatewayState {
        adapter: Arc::clone(&adapter),
        lifecycle,
        send_timeout: config.adapter.send_timeout(),
    });
    let router = build_router(state, qr_delivery);

    let local = listener.local_addr().context("listener has no local address")?;
    info!(addr = %local, qr_delivery = %qr_delivery, "WhatsApp gateway running");
    info!("send receipts to: POST http://{local}/send-receipt");
    info!("send messages to: POST http://{local}/send-message");
    if qr_delivery.serves_endpoint() {
        info!("login QR code at: GET http://{local}/qr");
    }

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error");

    info!("shutting down, releasing WhatsApp adapter");
    init_task.abort();
    if let Err(e) = adapter.destroy().await {
        warn!(error = %e, "adapter teardown reported an error");
    }

    match tokio::time::timeout(Duration::from_secs(TRACKER_DRAIN_SECS), tracker_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "lifecycle tracker ended abnormally"),
        Err(_) => warn!("lifecycle tracker still running after teardown, abandoning it"),
    }

    served
}

/// Resolves on SIGINT (Ctrl-C).
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => {
            error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
