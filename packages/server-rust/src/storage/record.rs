//! Store-native row representation.

use common_core::EntityMeta;
use serde_json::{Map, Value};

/// A stored row: server-assigned metadata plus the entity's own fields.
///
/// `data` never contains the metadata keys; those live in `meta` and map to
/// dedicated columns in SQL backends.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Identity and timestamps.
    pub meta: EntityMeta,
    /// Remaining entity fields as a JSON object.
    pub data: Map<String, Value>,
}

impl Record {
    /// Creates a record from its parts.
    #[must_use]
    pub fn new(meta: EntityMeta, data: Map<String, Value>) -> Self {
        Self { meta, data }
    }

    /// The non-null value of `field`, if any.
    #[must_use]
    pub fn field(&self, field: &str) -> Option<&Value> {
        self.data.get(field).filter(|v| !v.is_null())
    }
}
