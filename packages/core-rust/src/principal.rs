//! Authenticated subject carried from token verification into handlers.

use serde::{Deserialize, Serialize};

/// Authentication principal: who is calling and with which roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Subject identifier (the token's `sub` claim).
    pub id: String,
    /// Roles assigned to this principal for authorization checks.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Principal {
    /// Creates a principal with the given roles.
    pub fn new(id: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            id: id.into(),
            roles,
        }
    }

    /// True if the principal holds at least one of `required`.
    ///
    /// Flat role matching only: there is no role hierarchy.
    #[must_use]
    pub fn has_any_role(&self, required: &[&str]) -> bool {
        required
            .iter()
            .any(|role| self.roles.iter().any(|held| held == role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_any_role_matches_flat_roles() {
        let principal = Principal::new("user-1", vec!["editor".to_string()]);
        assert!(principal.has_any_role(&["admin", "editor"]));
        assert!(!principal.has_any_role(&["admin"]));
        assert!(!principal.has_any_role(&[]));
    }

    #[test]
    fn roles_default_to_empty() {
        let principal: Principal = serde_json::from_str(r#"{"id": "u"}"#).unwrap();
        assert!(principal.roles.is_empty());
    }
}
