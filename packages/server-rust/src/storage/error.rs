//! Errors signaled by store backends.

/// Failure reported by a [`Session`](crate::traits::Session) or
/// [`Database`](crate::traits::Database).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness or foreign-key constraint rejected the write.
    #[error("constraint {constraint} violated: {message}")]
    Integrity { constraint: String, message: String },
    /// The collection was never registered.
    #[error("unknown collection: {name}")]
    UnknownCollection { name: String },
    /// Any other backend failure (I/O, pool exhaustion, decoding, ...).
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Builds an integrity violation.
    pub fn integrity(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Integrity {
            constraint: constraint.into(),
            message: message.into(),
        }
    }
}
