//! Persisted entity shape: identity, timestamps and the [`Entity`] capability trait.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Field names owned by the server. Patches may never name them.
pub const META_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// Globally unique entity identifier (UUID v4), assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntityId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::validation(format!("Invalid id '{s}': {e}")))
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ---------------------------------------------------------------------------
// EntityMeta
// ---------------------------------------------------------------------------

/// Server-assigned fields every entity carries.
///
/// Entities embed this with `#[serde(flatten)]`, so the fields appear at the
/// top level of the serialized entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    /// Immutable identifier.
    pub id: EntityId,
    /// Millis since epoch, fixed at insertion.
    pub created_at: i64,
    /// Millis since epoch of the last mutation; `None` until the first one.
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl EntityMeta {
    /// Metadata for a not-yet-persisted entity: fresh id, `created_at = now`.
    #[must_use]
    pub fn new(now: i64) -> Self {
        Self {
            id: EntityId::new_v4(),
            created_at: now,
            updated_at: None,
        }
    }

    /// Stamps `updated_at`, never earlier than `created_at`.
    pub fn mark_updated(&mut self, now: i64) {
        if now < self.created_at {
            tracing::warn!(
                id = %self.id,
                created_at = self.created_at,
                now,
                "clock is behind entity creation time, clamping updated_at"
            );
        }
        self.updated_at = Some(now.max(self.created_at));
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A persisted record type managed by one repository.
///
/// The serialized form must be a flat JSON object that includes the
/// [`EntityMeta`] fields next to the entity's own fields.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Human-readable resource name used in not-found messages (e.g. `"Workflow"`).
    const RESOURCE: &'static str;

    /// Store collection (table) name.
    const COLLECTION: &'static str;

    /// Fields that carry a uniqueness constraint in the store.
    const UNIQUE_FIELDS: &'static [&'static str] = &[];

    /// Server-assigned metadata.
    fn meta(&self) -> &EntityMeta;

    /// Primary key accessor.
    fn id(&self) -> EntityId {
        self.meta().id
    }
}
