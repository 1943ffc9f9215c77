//! Process-wide `tracing` subscriber setup.

use clap::ValueEnum;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable, for local development.
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

/// Subscriber settings.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default filter directive (e.g. `info`, `common_server=debug`).
    pub level: String,
    pub format: LogFormat,
    /// Attached to the startup event so shipped logs can be attributed.
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            service_name: "service".to_string(),
        }
    }
}

impl LogConfig {
    /// The filter to install. `RUST_LOG` wins over `level`; an unparsable
    /// `level` falls back to `info`.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(self.level.to_lowercase()))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Installs the global subscriber.
///
/// Returns `false` if a subscriber was already installed, in which case the
/// existing one is kept.
pub fn init_tracing(config: &LogConfig) -> bool {
    let registry = tracing_subscriber::registry().with(config.env_filter());
    let installed = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
            .is_ok(),
        LogFormat::Pretty => registry.with(fmt::layer()).try_init().is_ok(),
    };
    if installed {
        tracing::info!(
            service = %config.service_name,
            format = ?config.format,
            "logging initialized"
        );
    }
    installed
}
