//! HTTP client for the WhatsApp Web bridge sidecar.
//!
//! The bridge runs the WhatsApp Web client (browser automation, session
//! storage, device linking) and exposes it over a small HTTP API:
//!
//! - `POST /initialize` starts session establishment
//! - `GET /events/poll` long-polls lifecycle events
//! - `POST /send` sends `{jid, text}`
//! - `POST /destroy` tears the client down

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::events::spawn_event_listener;
use super::{AdapterError, AdapterEvent, MessagingAdapter};
use crate::destination::Destination;

/// HTTP connect timeout for the reqwest client.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// HTTP request timeout for bridge calls.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Response envelope from the bridge HTTP API.
#[derive(Deserialize)]
struct BridgeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// [`MessagingAdapter`] backed by the bridge sidecar.
pub struct BridgeAdapter {
    client: reqwest::Client,
    base_url: String,
    shutdown_tx: watch::Sender<bool>,
    listener: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl BridgeAdapter {
    /// Create an adapter pointing at the given bridge base URL.
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            shutdown_tx,
            listener: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Bridge base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn ensure_alive(&self) -> Result<(), AdapterError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(AdapterError::Destroyed);
        }
        Ok(())
    }

    fn take_listener(&self) -> Option<JoinHandle<()>> {
        match self.listener.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// POST to a bridge endpoint and map the envelope to a result.
    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), AdapterError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        let envelope = serde_json::from_str::<BridgeResponse>(&text).ok();

        match envelope {
            Some(env) if status.is_success() && env.success => Ok(()),
            Some(BridgeResponse {
                error: Some(message),
                ..
            }) => Err(AdapterError::Rejected(message)),
            _ if status.is_success() && text.trim().is_empty() => Ok(()),
            _ => Err(AdapterError::Rejected(format!(
                "bridge returned {status} for {path}"
            ))),
        }
    }
}

#[async_trait]
impl MessagingAdapter for BridgeAdapter {
    async fn initialize(&self, events: mpsc::Sender<AdapterEvent>) -> Result<(), AdapterError> {
        self.ensure_alive()?;

        // Subscribe before asking the bridge to start so the first QR is not missed.
        let handle = spawn_event_listener(
            self.base_url.clone(),
            events,
            self.shutdown_tx.subscribe(),
        );
        let previous = match self.listener.lock() {
            Ok(mut slot) => slot.replace(handle),
            Err(poisoned) => poisoned.into_inner().replace(handle),
        };
        if let Some(old) = previous {
            warn!("initialize called twice, replacing bridge event listener");
            old.abort();
        }

        if let Err(e) = self.post("/initialize", serde_json::json!({})).await {
            if let Some(handle) = self.take_listener() {
                handle.abort();
            }
            warn!(
                bridge = %self.base_url,
                error = %e,
                "bridge initialization failed, no lifecycle events until restart"
            );
            return Err(e);
        }
        info!(bridge = %self.base_url, "bridge session initialization started");
        Ok(())
    }

    async fn send_message(
        &self,
        destination: &Destination,
        text: &str,
    ) -> Result<(), AdapterError> {
        self.ensure_alive()?;
        let body = serde_json::json!({ "jid": destination.jid(), "text": text });
        self.post("/send", body).await?;
        debug!(jid = %destination, "message accepted by bridge");
        Ok(())
    }

    async fn destroy(&self) -> Result<(), AdapterError> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            debug!("bridge adapter already destroyed");
            return Ok(());
        }

        // Listener exits on the flag; receivers may already be gone.
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.take_listener() {
            if let Err(e) = handle.await {
                warn!(error = %e, "bridge event listener ended abnormally");
            }
        }

        self.post("/destroy", serde_json::json!({})).await?;
        info!(bridge = %self.base_url, "bridge session destroyed");
        Ok(())
    }
}
