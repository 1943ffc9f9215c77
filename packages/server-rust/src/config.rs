//! Process configuration from command-line flags and environment variables.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser};
use jsonwebtoken::Algorithm;

use crate::auth::{TokenConfig, DEFAULT_EXPIRE_MINUTES};
use crate::logging::{LogConfig, LogFormat};
use crate::network::{CorsConfig, NetworkConfig};

/// Secret used when `JWT_SECRET_KEY` is unset. Only fit for development.
pub const DEFAULT_JWT_SECRET: &str = "your-secret-key-change-in-production";

/// Every setting a service reads at startup. Each flag can also be given
/// through the environment variable named after it.
#[derive(Debug, Clone, Parser)]
#[command(version, about = "CRUD service over a document store")]
pub struct AppConfig {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Postgres connection URL. Without it data lives in memory.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "DB_POOL_SIZE", default_value_t = 10)]
    pub db_pool_size: u32,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Defaults to `json` in production and `pretty` elsewhere.
    #[arg(long, env = "LOG_FORMAT", value_enum, ignore_case = true)]
    pub log_format: Option<LogFormat>,

    #[arg(long, env = "SERVICE_NAME", default_value = "crud-demo")]
    pub service_name: String,

    #[arg(long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: String,

    #[arg(long, env = "JWT_SECRET_KEY", default_value = DEFAULT_JWT_SECRET, hide_env_values = true, hide_default_value = true)]
    pub jwt_secret_key: String,

    #[arg(long, env = "JWT_ALGORITHM", default_value = "HS256")]
    pub jwt_algorithm: String,

    #[arg(long, env = "JWT_EXPIRE_MINUTES", default_value_t = DEFAULT_EXPIRE_MINUTES)]
    pub jwt_expire_minutes: u64,

    /// Comma-separated origins; `*` allows any.
    #[arg(long, env = "CORS_ORIGINS")]
    pub cors_origins: Option<String>,

    #[arg(long, env = "CORS_ALLOW_CREDENTIALS", default_value_t = true, action = ArgAction::Set)]
    pub cors_allow_credentials: bool,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "CACHE_CAPACITY", default_value_t = crate::cache::DEFAULT_CAPACITY)]
    pub cache_capacity: usize,

    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 300)]
    pub cache_ttl_secs: u64,
}

impl AppConfig {
    /// True when `ENVIRONMENT` is `production` (any case).
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// True if no secret was configured.
    #[must_use]
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret_key == DEFAULT_JWT_SECRET
    }

    #[must_use]
    pub fn network_config(&self) -> NetworkConfig {
        let cors = CorsConfig {
            origins: self
                .cors_origins
                .as_deref()
                .map(CorsConfig::parse_origins)
                .filter(|origins| !origins.is_empty())
                .unwrap_or_else(|| CorsConfig::default().origins),
            allow_credentials: self.cors_allow_credentials,
        };
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Token settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `JWT_ALGORITHM` is unknown or not an HMAC
    /// algorithm, or if the secret is empty.
    pub fn token_config(&self) -> anyhow::Result<TokenConfig> {
        let algorithm = Algorithm::from_str(&self.jwt_algorithm)
            .with_context(|| format!("unknown JWT algorithm {:?}", self.jwt_algorithm))?;
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            bail!(
                "JWT algorithm {:?} needs a key pair; only HS256, HS384 and HS512 are supported",
                self.jwt_algorithm
            );
        }
        if self.jwt_secret_key.is_empty() {
            bail!("JWT secret key must not be empty");
        }
        Ok(TokenConfig {
            secret: self.jwt_secret_key.clone(),
            algorithm,
            expire_minutes: self.jwt_expire_minutes,
        })
    }

    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        let format = self.log_format.unwrap_or(if self.is_production() {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        });
        LogConfig {
            level: self.log_level.clone(),
            format,
            service_name: self.service_name.clone(),
        }
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
