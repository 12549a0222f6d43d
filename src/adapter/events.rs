//! Long-poll listener for bridge lifecycle events.
//!
//! Polls the bridge's `/events/poll` endpoint and forwards every event to the
//! lifecycle tracker through an mpsc channel.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::AdapterEvent;

/// Long-poll timeout for the HTTP client (seconds).
const POLL_TIMEOUT_SECS: u64 = 60;

/// Initial reconnect backoff (milliseconds).
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum reconnect backoff (milliseconds).
const MAX_BACKOFF_MS: u64 = 30_000;

/// Pause after a non-200 poll response (seconds).
const NON_SUCCESS_PAUSE_SECS: u64 = 5;

/// Why a poll session ended.
#[derive(Debug, PartialEq, Eq)]
enum PollExit {
    /// The event receiver was dropped.
    ReceiverClosed,
    /// Shutdown was requested.
    Shutdown,
}

/// Spawn an event listener that forwards bridge events to `event_tx`.
///
/// Returns immediately. The listener reconnects with exponential backoff on
/// network errors and exits when `shutdown_rx` flips to `true`, its sender is
/// dropped, or `event_tx`'s receiver is dropped.
pub fn spawn_event_listener(
    base_url: String,
    event_tx: mpsc::Sender<AdapterEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let poll_url = format!("{base_url}/events/poll");
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            info!(url = %poll_url, "connecting to bridge event stream");

            match poll_events(&poll_url, &event_tx, &mut shutdown_rx).await {
                Ok(PollExit::ReceiverClosed) => {
                    info!("event receiver dropped, stopping bridge listener");
                    break;
                }
                Ok(PollExit::Shutdown) => {
                    debug!("bridge listener shut down");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, backoff_ms, "bridge event stream error, reconnecting");
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(backoff_ms)) => {}
                        _ = wait_for_shutdown(&mut shutdown_rx) => break,
                    }
                    backoff_ms = next_backoff(backoff_ms);
                }
            }
        }
    })
}

/// Double the backoff, capped at [`MAX_BACKOFF_MS`].
fn next_backoff(current_ms: u64) -> u64 {
    current_ms.saturating_mul(2).min(MAX_BACKOFF_MS)
}

/// Resolves once shutdown is requested or the sender side is gone.
async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    if *shutdown_rx.borrow() {
        return;
    }
    while shutdown_rx.changed().await.is_ok() {
        if *shutdown_rx.borrow() {
            return;
        }
    }
}

/// Poll the bridge in a loop. Returns `Err` on non-timeout network errors so
/// the caller can reconnect with backoff.
async fn poll_events(
    poll_url: &str,
    event_tx: &mpsc::Sender<AdapterEvent>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<PollExit, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(POLL_TIMEOUT_SECS))
        .build()?;

    loop {
        let response = tokio::select! {
            response = client.get(poll_url).send() => response,
            _ = wait_for_shutdown(shutdown_rx) => return Ok(PollExit::Shutdown),
        };

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<Vec<AdapterEvent>>().await {
                Ok(events) => {
                    for event in events {
                        debug!(?event, "received bridge event");
                        if event_tx.send(event).await.is_err() {
                            return Ok(PollExit::ReceiverClosed);
                        }
                    }
                }
                Err(e) => warn!(error = %e, "ignoring malformed event batch"),
            },
            Ok(resp) => {
                debug!(status = %resp.status(), "event poll returned non-200");
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(NON_SUCCESS_PAUSE_SECS)) => {}
                    _ = wait_for_shutdown(shutdown_rx) => return Ok(PollExit::Shutdown),
                }
            }
            // Long-poll window elapsed with nothing to report.
            Err(e) if e.is_timeout() => continue,
            Err(e) => return Err(e),
        }
    }
}
