//! HTTP boundary configuration.

use std::time::Duration;

/// Default origins allowed when none are configured.
pub const DEFAULT_CORS_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "http://localhost:5173",
    "http://localhost:8080",
];

/// Top-level network configuration for the server.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Cross-origin policy.
    pub cors: CorsConfig,
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors: CorsConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Cross-Origin Resource Sharing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any origin.
    pub origins: Vec<String>,
    /// Whether browsers may send credentials (cookies, auth headers).
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: DEFAULT_CORS_ORIGINS.iter().map(ToString::to_string).collect(),
            allow_credentials: true,
        }
    }
}

impl CorsConfig {
    /// Parses a comma-separated origin list, trimming whitespace and
    /// dropping empty entries.
    #[must_use]
    pub fn parse_origins(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}
