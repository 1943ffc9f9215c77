//! Capability traits tying message shapes to an [`Entity`].
//!
//! A service is generic over four types: the entity `E`, a create message
//! implementing [`CreateMessage<E>`], an update message implementing
//! [`UpdateMessage`], and a response message implementing `From<E>`.
//! Response messages are only ever built from persisted entities.

use serde::{Deserialize, Deserializer, Serialize};

use crate::entity::{Entity, EntityMeta};
use crate::error::DomainError;
use crate::patch::Patch;

/// Caller payload that constructs a new entity.
///
/// The message never carries id or timestamps; `meta` is assigned by the
/// service before the entity reaches the repository.
pub trait CreateMessage<E: Entity>: Send {
    /// Builds the unpersisted entity.
    fn into_entity(self, meta: EntityMeta) -> E;
}

/// Caller payload for a partial update.
///
/// The default implementation serializes the message and keeps every key
/// that survives serialization. Mark optional fields with
/// `#[serde(skip_serializing_if = "Option::is_none")]` so unset fields never
/// overwrite stored values.
pub trait UpdateMessage: Serialize + Send {
    /// Extracts the explicitly set fields.
    ///
    /// # Errors
    ///
    /// Returns a validation failure if the message names a server-assigned
    /// field or does not serialize to an object.
    fn into_patch(self) -> Result<Patch, DomainError>
    where
        Self: Sized,
    {
        Patch::from_serialize(&self)
    }
}

/// `deserialize_with` helper for clearable fields typed `Option<Option<T>>`.
///
/// Plain serde folds `null` into the outer `None`; with this helper a
/// present `null` becomes `Some(None)` (clear the field) while an absent key
/// stays `None` (leave it alone). Pair it with `#[serde(default)]`.
///
/// # Errors
///
/// Propagates the inner deserializer's error.
pub fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
