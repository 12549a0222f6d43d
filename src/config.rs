//! Configuration loading and validation.
//!
//! Loads gateway configuration from `./gateway.toml` (or
//! `$GATEWAY_CONFIG_PATH`, or an explicit path). Environment variables
//! override file values; file values override defaults.
//!
//! Precedence: CLI flags > env vars > config file > defaults. CLI flags are
//! applied with [`GatewayConfig::apply_cli`] after [`GatewayConfig::load`].

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::qr::QrDelivery;

/// Config file used when neither `--config` nor `$GATEWAY_CONFIG_PATH` is set.
pub const DEFAULT_CONFIG_FILE: &str = "gateway.toml";

// ── Top-level config ────────────────────────────────────────────

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener settings (`[server]`).
    pub server: ServerConfig,
    /// Bridge adapter settings (`[adapter]`).
    pub adapter: AdapterConfig,
    /// QR challenge delivery (`[qr]`).
    pub qr: QrConfig,
    /// Log output (`[logging]`).
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port (`PORT`).
    pub port: u16,
    /// Bind address (`GATEWAY_BIND`).
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: "0.0.0.0".to_owned(),
        }
    }
}

impl ServerConfig {
    /// Listener address built from `bind` and `port`.
    ///
    /// # Errors
    ///
    /// Returns an error if `bind` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind
            .parse()
            .with_context(|| format!("invalid bind address '{}'", self.bind))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Bridge adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Base URL of the WhatsApp Web bridge (`GATEWAY_BRIDGE_URL`).
    pub bridge_url: String,
    /// Upper bound on a single send, in seconds (`GATEWAY_SEND_TIMEOUT_SECS`).
    pub send_timeout_secs: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            bridge_url: "http://127.0.0.1:3100".to_owned(),
            send_timeout_secs: 60,
        }
    }
}

impl AdapterConfig {
    /// Send timeout as a [`Duration`].
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

/// QR delivery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// `terminal` or `endpoint` (`GATEWAY_QR_DELIVERY`).
    pub delivery: QrDelivery,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for rotated JSON logs (`GATEWAY_LOG_DIR`). Console only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            dir: None,
        }
    }
}

fn default_port() -> u16 {
    3001
}

/// Flags that override file and environment configuration.
///
/// Shared by `serve` and `check-config` so both resolve the same values.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CliOverrides {
    /// Port to listen on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Where to show the login QR code.
    #[arg(long, value_enum)]
    pub qr_delivery: Option<QrDelivery>,

    /// Base URL of the WhatsApp Web bridge.
    #[arg(long)]
    pub bridge_url: Option<String>,
}

/// An environment override that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredOverride {
    /// Environment variable name.
    pub var: &'static str,
    /// Raw value as found in the environment.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

/// What happened while loading, kept so it can be logged once a subscriber
/// is installed.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Config file that was looked up.
    pub path: PathBuf,
    /// Whether that file existed.
    pub file_found: bool,
    /// Env overrides that were ignored.
    pub ignored: Vec<IgnoredOverride>,
}

impl LoadReport {
    /// Emit the collected notes through `tracing`.
    pub fn log(&self) {
        if self.file_found {
            tracing::info!(path = %self.path.display(), "loaded config from file");
        } else {
            tracing::info!(path = %self.path.display(), "no config file found, using defaults");
        }
        for ignored in &self.ignored {
            tracing::warn!(
                var = ignored.var,
                value = %ignored.value,
                reason = %ignored.reason,
                "ignoring invalid env override"
            );
        }
    }
}

impl GatewayConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// File path: `path` if given, else `$GATEWAY_CONFIG_PATH`, else
    /// `./gateway.toml`. A missing file yields defaults. Nothing is logged
    /// here; pass the returned [`LoadReport`] to the logger once it is up.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<(Self, LoadReport)> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// [`GatewayConfig::load`] with a custom env resolver (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_with(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, LoadReport)> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env("GATEWAY_CONFIG_PATH").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let (mut config, file_found) = Self::load_from_file(&path)?;
        let ignored = config.apply_overrides(env);
        Ok((
            config,
            LoadReport {
                path,
                file_found,
                ignored,
            },
        ))
    }

    /// Load from a TOML file only, no env overrides. Also reports whether
    /// the file existed.
    fn load_from_file(path: &Path) -> Result<(Self, bool)> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str::<Self>(&contents)
                .map(|config| (config, true))
                .with_context(|| format!("failed to parse config at {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok((Self::default(), false)),
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            )),
        }
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in
    /// tests). Values that do not parse leave the current setting untouched
    /// and are returned.
    pub fn apply_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Vec<IgnoredOverride> {
        let mut ignored = Vec::new();

        // Server.
        if let Some(v) = env("PORT") {
            match v.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(e) => ignored.push(IgnoredOverride {
                    var: "PORT",
                    value: v,
                    reason: e.to_string(),
                }),
            }
        }
        if let Some(v) = env("GATEWAY_BIND") {
            self.server.bind = v;
        }

        // Adapter.
        if let Some(v) = env("GATEWAY_BRIDGE_URL") {
            self.adapter.bridge_url = v;
        }
        if let Some(v) = env("GATEWAY_SEND_TIMEOUT_SECS") {
            match v.trim().parse() {
                Ok(secs) => self.adapter.send_timeout_secs = secs,
                Err(e) => ignored.push(IgnoredOverride {
                    var: "GATEWAY_SEND_TIMEOUT_SECS",
                    value: v,
                    reason: e.to_string(),
                }),
            }
        }

        // QR.
        if let Some(v) = env("GATEWAY_QR_DELIVERY") {
            match v.parse() {
                Ok(delivery) => self.qr.delivery = delivery,
                Err(reason) => ignored.push(IgnoredOverride {
                    var: "GATEWAY_QR_DELIVERY",
                    value: v,
                    reason,
                }),
            }
        }

        // Logging.
        if let Some(v) = env("GATEWAY_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(v));
        }

        ignored
    }

    /// Apply command-line flags, the highest-precedence layer.
    pub fn apply_cli(&mut self, flags: CliOverrides) {
        if let Some(port) = flags.port {
            self.server.port = port;
        }
        if let Some(delivery) = flags.qr_delivery {
            self.qr.delivery = delivery;
        }
        if let Some(url) = flags.bridge_url {
            self.adapter.bridge_url = url;
        }
    }

    /// Check values that parse but cannot work.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be between 1 and 65535");
        }
        self.server.socket_addr()?;
        let url = url::Url::parse(&self.adapter.bridge_url).with_context(|| {
            format!("invalid adapter.bridge_url '{}'", self.adapter.bridge_url)
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!(
                "adapter.bridge_url must use http or https, got '{}'",
                url.scheme()
            );
        }
        if self.adapter.send_timeout_secs == 0 {
            anyhow::bail!("adapter.send_timeout_secs must be at least 1");
        }
        Ok(())
    }
}
