//! Partial-update payloads.
//!
//! A [`Patch`] holds exactly the fields a caller set explicitly. Applying it
//! overwrites those fields and leaves every other field untouched.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::entity::META_FIELDS;
use crate::error::{DomainError, Details};

/// Set of explicitly provided fields (name -> new JSON value).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: Map<String, Value>,
}

impl Patch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a patch from any serializable update message.
    ///
    /// Every key present in the serialized object becomes a patch field, so
    /// unset optional fields must be skipped during serialization
    /// (`skip_serializing_if = "Option::is_none"`).
    ///
    /// # Errors
    ///
    /// Returns a validation failure if the message does not serialize to a
    /// JSON object or names a server-assigned field.
    pub fn from_serialize<T: Serialize>(message: &T) -> Result<Self, DomainError> {
        let value = serde_json::to_value(message)
            .map_err(|e| DomainError::validation(format!("Invalid update payload: {e}")))?;

        let Value::Object(fields) = value else {
            return Err(DomainError::validation(
                "Invalid update payload: expected an object",
            ));
        };

        let mut patch = Self::new();
        for (field, value) in fields {
            patch.set(field, value)?;
        }
        Ok(patch)
    }

    /// Sets a single field.
    ///
    /// # Errors
    ///
    /// Returns a validation failure if `field` is server-assigned.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Result<(), DomainError> {
        let field = field.into();
        if META_FIELDS.contains(&field.as_str()) {
            let mut details = Details::new();
            details.insert("field".to_string(), Value::String(field.clone()));
            return Err(DomainError::validation_with(
                format!("Field '{field}' is server-assigned and cannot be updated"),
                details,
            ));
        }
        self.fields.insert(field, value.into());
        Ok(())
    }

    /// Returns the new value for `field`, if the patch sets it.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Iterates the set fields in insertion order of the underlying map.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Number of set fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Overwrites the patched keys of `target`, leaving the others untouched.
    pub fn apply_to(&self, target: &mut Map<String, Value>) {
        for (field, value) in &self.fields {
            target.insert(field.clone(), value.clone());
        }
    }

    /// The patch as a JSON object.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    struct RenameWidget {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<Option<String>>,
    }

    #[test]
    fn unset_fields_are_not_in_patch() {
        let patch = Patch::from_serialize(&RenameWidget {
            name: None,
            description: None,
        })
        .unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn explicit_null_clears_nullable_field() {
        let patch = Patch::from_serialize(&RenameWidget {
            name: Some("B".to_string()),
            description: Some(None),
        })
        .unwrap();
        assert_eq!(patch.len(), 2);
        assert_eq!(patch.get("name"), Some(&json!("B")));
        assert_eq!(patch.get("description"), Some(&Value::Null));
    }

    #[test]
    fn server_assigned_fields_are_rejected() {
        let mut patch = Patch::new();
        let err = patch.set("id", "abc").unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.details()["field"], "id");

        assert!(patch.set("created_at", 1).is_err());
        assert!(patch.set("updated_at", 1).is_err());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = Patch::from_serialize(&"just a string").unwrap_err();
        assert!(err.message().contains("expected an object"));
    }

    #[test]
    fn apply_to_only_touches_patched_keys() {
        let mut target = json!({"name": "A", "color": "red"})
            .as_object()
            .cloned()
            .unwrap();
        let mut patch = Patch::new();
        patch.set("name", "B").unwrap();

        patch.apply_to(&mut target);
        assert_eq!(target["name"], "B");
        assert_eq!(target["color"], "red");
    }
}
