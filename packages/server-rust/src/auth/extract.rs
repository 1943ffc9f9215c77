//! Axum extractor for the authenticated caller.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use common_core::{DomainError, Principal};

use super::token::{require_roles, TokenAuthority};
use crate::network::handlers::error::ApiError;

/// Principal extracted from an `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl CurrentUser {
    /// Passes if the caller holds at least one of `roles`.
    ///
    /// # Errors
    ///
    /// Returns an unauthorized failure listing the required roles.
    pub fn require(&self, roles: &[&str]) -> Result<(), DomainError> {
        require_roles(&self.0, roles)
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<TokenAuthority>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path().to_string();
        let Some(token) = bearer_token(&parts.headers) else {
            return Err(ApiError::new(
                DomainError::unauthorized(Some("Not authenticated")),
                path,
            ));
        };

        let authority = Arc::<TokenAuthority>::from_ref(state);
        authority
            .principal(token)
            .map(CurrentUser)
            .map_err(|e| ApiError::new(e, path))
    }
}

/// The token of a `Bearer` authorization header, if present.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, Request};

    use super::*;
    use crate::auth::TokenConfig;

    async fn extract(
        authority: &Arc<TokenAuthority>,
        token: Option<&str>,
    ) -> Result<CurrentUser, ApiError> {
        let mut request = Request::get("/widgets");
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let (mut parts, ()) = request.body(()).unwrap().into_parts();
        CurrentUser::from_request_parts(&mut parts, authority).await
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn other_schemes_and_empty_tokens_are_ignored() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn extracted_caller_is_checked_against_roles() {
        let authority = Arc::new(TokenAuthority::new(TokenConfig::new("test-secret")));
        let token = authority.issue("user-1", &["editor"], None).unwrap();

        let user = extract(&authority, Some(&token)).await.unwrap();
        assert_eq!(user.0.id, "user-1");
        assert!(user.require(&["admin", "editor"]).is_ok());

        let err = user.require(&["admin"]).unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert!(err.message().starts_with("Insufficient permissions"));
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let authority = Arc::new(TokenAuthority::new(TokenConfig::new("test-secret")));
        assert!(extract(&authority, None).await.is_err());
    }
}
