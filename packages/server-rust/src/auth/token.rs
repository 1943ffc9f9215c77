//! Signed, expiring bearer tokens (JWT) and flat role checks.

use std::sync::Arc;
use std::time::Duration;

use common_core::{ClockSource, Details, DomainError, Principal, SystemClock};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Default token lifetime in minutes.
pub const DEFAULT_EXPIRE_MINUTES: u64 = 30;

/// Token signing configuration.
#[derive(Clone)]
pub struct TokenConfig {
    /// Shared HMAC secret.
    pub secret: String,
    /// Signing algorithm. Only the HMAC family (`HS256`, `HS384`, `HS512`) is
    /// supported with a shared secret.
    pub algorithm: Algorithm,
    /// Lifetime of issued tokens when no explicit TTL is given.
    pub expire_minutes: u64,
}

impl TokenConfig {
    /// `HS256` with the default lifetime.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithm: Algorithm::HS256,
            expire_minutes: DEFAULT_EXPIRE_MINUTES,
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("expire_minutes", &self.expire_minutes)
            .finish()
    }
}

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Roles held by the subject.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Expiry, seconds since epoch.
    pub exp: u64,
    /// Issued-at, seconds since epoch.
    pub iat: u64,
}

/// Issues and verifies tokens with one key.
pub struct TokenAuthority {
    config: TokenConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn ClockSource>,
}

impl TokenAuthority {
    /// Creates an authority that stamps `iat` with the system clock.
    #[must_use]
    pub fn new(config: TokenConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an authority with an injected clock for issuing.
    ///
    /// Expiry is always checked against the real time during verification.
    #[must_use]
    pub fn with_clock(config: TokenConfig, clock: Arc<dyn ClockSource>) -> Self {
        let encoding = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding = DecodingKey::from_secret(config.secret.as_bytes());
        let validation = Validation::new(config.algorithm);
        Self {
            config,
            encoding,
            decoding,
            validation,
            clock,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Signs a token for `subject` valid for `ttl` (default: configured lifetime).
    ///
    /// # Errors
    ///
    /// Returns the signing error, e.g. when the algorithm does not accept a
    /// shared secret.
    pub fn issue(
        &self,
        subject: &str,
        roles: &[&str],
        ttl: Option<Duration>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let ttl = ttl.unwrap_or(Duration::from_secs(self.config.expire_minutes * 60));
        let iat = u64::try_from(self.clock.now_millis() / 1000).unwrap_or_default();
        let claims = Claims {
            sub: Some(subject.to_string()),
            roles: roles.iter().map(|role| (*role).to_string()).collect(),
            exp: iat + ttl.as_secs(),
            iat,
        };
        encode(&Header::new(self.config.algorithm), &claims, &self.encoding)
    }

    /// Decodes and validates a token (signature, algorithm and expiry).
    ///
    /// # Errors
    ///
    /// Returns an unauthorized failure `"Invalid token: {reason}"`.
    pub fn verify(&self, token: &str) -> Result<Claims, DomainError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                DomainError::unauthorized(Some(&format!("Invalid token: {e}")))
            })
    }

    /// Verifies a token and extracts its subject and roles.
    ///
    /// # Errors
    ///
    /// Returns an unauthorized failure if the token is invalid or carries no
    /// subject.
    pub fn principal(&self, token: &str) -> Result<Principal, DomainError> {
        let claims = self.verify(token)?;
        match claims.sub {
            Some(sub) if !sub.is_empty() => Ok(Principal::new(sub, claims.roles)),
            _ => Err(DomainError::unauthorized(Some("User ID not found in token"))),
        }
    }
}

/// Passes if `principal` holds at least one of `required`.
///
/// # Errors
///
/// Returns an unauthorized failure listing the required roles.
pub fn require_roles(principal: &Principal, required: &[&str]) -> Result<(), DomainError> {
    if principal.has_any_role(required) {
        return Ok(());
    }
    let mut details = Details::new();
    details.insert("required_roles".to_string(), required.into());
    Err(DomainError::unauthorized_with(
        format!(
            "Insufficient permissions. Required roles: {}",
            required.join(", ")
        ),
        details,
    ))
}
