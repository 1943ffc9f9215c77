//! Bearer-token authentication.
//!
//! - [`TokenAuthority`]: issues and verifies signed, expiring tokens
//! - [`require_roles`]: flat role gate over a [`Principal`](common_core::Principal)
//! - [`CurrentUser`]: axum extractor for the authenticated caller

mod extract;
mod token;

pub use extract::{bearer_token, CurrentUser};
pub use token::{require_roles, Claims, TokenAuthority, TokenConfig, DEFAULT_EXPIRE_MINUTES};
