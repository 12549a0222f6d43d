//! QR challenge delivery: terminal rendering or the `/qr` endpoint.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use base64::Engine as _;
use qrcode::render::{svg, unicode};
use qrcode::QrCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Minimum edge length of the SVG served by `/qr`, in pixels.
const SVG_MIN_DIMENSION: u32 = 300;

/// Seconds between automatic reloads of the QR page. Challenges rotate.
const PAGE_REFRESH_SECS: u32 = 20;

/// Errors from QR rendering.
#[derive(Debug, thiserror::Error)]
pub enum QrError {
    /// The payload does not fit in a QR code.
    #[error("failed to encode QR payload: {0}")]
    Encode(#[from] qrcode::types::QrError),
}

/// Where a freshly issued QR challenge is shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QrDelivery {
    /// Print the code to stdout as Unicode blocks.
    #[default]
    Terminal,
    /// Keep the code for `GET /qr`, which serves it as an HTML page.
    Endpoint,
}

impl QrDelivery {
    /// Whether the `/qr` route should be mounted.
    pub fn serves_endpoint(self) -> bool {
        matches!(self, Self::Endpoint)
    }

    /// Surface a new challenge to the operator.
    ///
    /// The endpoint strategy needs nothing here beyond a log line; the
    /// payload is read from the lifecycle state on request.
    pub fn deliver(self, payload: &str) {
        match self {
            Self::Terminal => match render_terminal(payload) {
                // Stdout writes block; keep them off the async workers.
                Ok(art) => match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        runtime.spawn_blocking(move || print_block(&art));
                    }
                    Err(_) => print_block(&art),
                },
                Err(e) => warn!(error = %e, "failed to render QR code"),
            },
            Self::Endpoint => info!("QR code available at GET /qr"),
        }
    }
}

fn print_block(art: &str) {
    let mut out = std::io::stdout().lock();
    if let Err(e) = writeln!(out, "{art}").and_then(|()| out.flush()) {
        warn!(error = %e, "failed to print QR code");
    }
}

impl fmt::Display for QrDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminal => f.write_str("terminal"),
            Self::Endpoint => f.write_str("endpoint"),
        }
    }
}

impl FromStr for QrDelivery {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "terminal" => Ok(Self::Terminal),
            "endpoint" | "http" => Ok(Self::Endpoint),
            other => Err(format!(
                "unknown QR delivery '{other}' (expected terminal or endpoint)"
            )),
        }
    }
}

/// Render a payload as compact Unicode half-block art.
///
/// # Errors
///
/// Returns [`QrError::Encode`] if the payload is too long for a QR code.
pub fn render_terminal(payload: &str) -> Result<String, QrError> {
    let code = QrCode::new(payload.as_bytes())?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Render a payload as an SVG document.
///
/// # Errors
///
/// Returns [`QrError::Encode`] if the payload is too long for a QR code.
pub fn render_svg(payload: &str) -> Result<String, QrError> {
    let code = QrCode::new(payload.as_bytes())?;
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(SVG_MIN_DIMENSION, SVG_MIN_DIMENSION)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}

/// Render the HTML page served by `GET /qr`, with the code embedded as a
/// base64 data URI.
///
/// # Errors
///
/// Returns [`QrError::Encode`] if the payload is too long for a QR code.
pub fn render_html(payload: &str) -> Result<String, QrError> {
    let svg = render_svg(payload)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(svg);
    Ok(format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <meta http-equiv=\"refresh\" content=\"{PAGE_REFRESH_SECS}\">\n\
         <title>WhatsApp login</title>\n\
         </head>\n\
         <body style=\"font-family: sans-serif; text-align: center; margin-top: 3em;\">\n\
         <h1>Scan with WhatsApp</h1>\n\
         <p>Open WhatsApp on your phone, go to Linked devices and scan this code.</p>\n\
         <img src=\"data:image/svg+xml;base64,{encoded}\" alt=\"WhatsApp login QR code\">\n\
         </body>\n\
         </html>\n"
    ))
}
