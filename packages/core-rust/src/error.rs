//! Domain failure taxonomy shared by every service.
//!
//! [`DomainError`] is the single failure shape surfaced at service boundaries:
//! a closed [`ErrorKind`] (which fixes the HTTP-style status code), a
//! human-readable message, and a structured [`Details`] mapping. Boundary code
//! matches on the kind, never on the message text.
//!
//! [`CrudError`] is what repositories and services return: either a domain
//! failure or an opaque store failure that propagates unchanged.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured error details (string key -> arbitrary JSON value).
///
/// `BTreeMap` keeps rendering order deterministic.
pub type Details = BTreeMap<String, serde_json::Value>;

/// Fallback message for not-found failures without resource and id.
pub const DEFAULT_NOT_FOUND_MESSAGE: &str = "Resource not found";

/// Fallback message for unauthorized failures.
pub const DEFAULT_UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Closed set of domain failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Caller data broke a business rule or a store constraint (400).
    Validation,
    /// The requested entity does not exist (404).
    NotFound,
    /// Authentication or authorization failed (401).
    Unauthorized,
}

impl ErrorKind {
    /// HTTP-style status code for this kind.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::Unauthorized => 401,
        }
    }

    /// Stable kind name rendered in the `error` field of error bodies.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::NotFound => "NotFoundError",
            Self::Unauthorized => "UnauthorizedError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// DomainError
// ---------------------------------------------------------------------------

/// A typed domain failure carrying a status code, message and details.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("[{}] {message}", .kind.status_code())]
pub struct DomainError {
    kind: ErrorKind,
    message: String,
    details: Details,
}

impl DomainError {
    /// Builds a failure of any kind. Prefer the kind-specific constructors.
    pub fn new(kind: ErrorKind, message: impl Into<String>, details: Details) -> Self {
        Self {
            kind,
            message: message.into(),
            details,
        }
    }

    /// Validation failure with a free-form message and no details.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message, Details::new())
    }

    /// Validation failure with structured details.
    pub fn validation_with(message: impl Into<String>, details: Details) -> Self {
        Self::new(ErrorKind::Validation, message, details)
    }

    /// Not-found failure templated from a resource name and an id.
    ///
    /// The message reads `"{resource} {id} not found"` only when both parts
    /// are present; otherwise it falls back to [`DEFAULT_NOT_FOUND_MESSAGE`].
    /// `details` receives whichever of `resource` / `id` were supplied.
    #[must_use]
    pub fn not_found(resource: Option<&str>, id: Option<&str>) -> Self {
        let message = match (resource, id) {
            (Some(resource), Some(id)) => format!("{resource} {id} not found"),
            _ => DEFAULT_NOT_FOUND_MESSAGE.to_string(),
        };

        let mut details = Details::new();
        if let Some(resource) = resource {
            details.insert("resource".to_string(), resource.into());
        }
        if let Some(id) = id {
            details.insert("id".to_string(), id.into());
        }

        Self::new(ErrorKind::NotFound, message, details)
    }

    /// Not-found failure with a caller-chosen message.
    pub fn not_found_message(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message, Details::new())
    }

    /// Unauthorized failure; `None` uses [`DEFAULT_UNAUTHORIZED_MESSAGE`].
    #[must_use]
    pub fn unauthorized(message: Option<&str>) -> Self {
        Self::new(
            ErrorKind::Unauthorized,
            message.unwrap_or(DEFAULT_UNAUTHORIZED_MESSAGE),
            Details::new(),
        )
    }

    /// Unauthorized failure with structured details.
    pub fn unauthorized_with(message: impl Into<String>, details: Details) -> Self {
        Self::new(ErrorKind::Unauthorized, message, details)
    }

    /// The failure kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Status code derived from the kind.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    /// Kind name, e.g. `"NotFoundError"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured details.
    #[must_use]
    pub fn details(&self) -> &Details {
        &self.details
    }
}

// ---------------------------------------------------------------------------
// CrudError
// ---------------------------------------------------------------------------

/// Failure returned by repositories and services.
///
/// `Store` wraps backend failures (lost connection, corrupt row, ...) that
/// are not domain failures; they propagate to the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum CrudError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("store failure: {0}")]
    Store(#[source] anyhow::Error),
}

impl CrudError {
    /// Returns the domain failure, if this is one.
    #[must_use]
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(err) => Some(err),
            Self::Store(_) => None,
        }
    }

    /// Returns the domain failure kind, if this is a domain failure.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        self.as_domain().map(DomainError::kind)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
