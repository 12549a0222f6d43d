//! WhatsApp gateway: a thin HTTP front for sending receipts and messages.
//!
//! Requests are validated, the phone number is normalized to a WhatsApp
//! contact address, and the text is forwarded to a [`adapter::MessagingAdapter`].
//! Session establishment, device linking and transport stay behind the
//! adapter; the gateway only tracks its lifecycle (QR challenge, readiness).
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod config;
pub mod destination;
pub mod gateway;
pub mod lifecycle;
pub mod logging;
pub mod qr;
