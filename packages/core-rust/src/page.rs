//! Offset/limit pagination bounds.

use serde::Deserialize;

use crate::error::{DomainError, Details};

/// Default number of rows skipped.
pub const DEFAULT_SKIP: usize = 0;

/// Default page size.
pub const DEFAULT_LIMIT: usize = 100;

/// Upper bound on the page size, so no caller can request an unbounded scan.
pub const MAX_PAGE_LIMIT: usize = 1000;

/// A validated page request.
///
/// Deserializes from query strings such as `?skip=10&limit=20`; missing
/// values take the defaults. Call [`Page::validate`] (or build through
/// [`Page::new`]) before handing a deserialized page to a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Page {
    /// Rows to skip.
    #[serde(default = "default_skip")]
    pub skip: usize,
    /// Maximum rows to return.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_skip() -> usize {
    DEFAULT_SKIP
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Page {
    /// Builds a validated page.
    ///
    /// # Errors
    ///
    /// Returns a validation failure if `limit` is 0 or above [`MAX_PAGE_LIMIT`].
    pub fn new(skip: usize, limit: usize) -> Result<Self, DomainError> {
        Self { skip, limit }.validate()
    }

    /// Checks the bounds of a page built by deserialization.
    ///
    /// # Errors
    ///
    /// Returns a validation failure if `limit` is 0 or above [`MAX_PAGE_LIMIT`].
    pub fn validate(self) -> Result<Self, DomainError> {
        if self.limit == 0 || self.limit > MAX_PAGE_LIMIT {
            let mut details = Details::new();
            details.insert("limit".to_string(), self.limit.into());
            details.insert("max_limit".to_string(), MAX_PAGE_LIMIT.into());
            return Err(DomainError::validation_with(
                format!("limit must be between 1 and {MAX_PAGE_LIMIT}"),
                details,
            ));
        }
        Ok(self)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: DEFAULT_SKIP,
            limit: DEFAULT_LIMIT,
        }
    }
}
