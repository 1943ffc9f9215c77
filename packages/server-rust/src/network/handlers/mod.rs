//! HTTP handler definitions.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod crud;
pub mod error;
pub mod health;

pub use crud::crud_router;
pub use error::ApiError;
pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::FromRef;

use crate::auth::TokenAuthority;
use crate::cache::{CacheClient, CacheEpochs};
use crate::service::RepositoryFactory;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Builds request-scoped services over the process-wide database.
    pub factory: RepositoryFactory,
    /// Verifies bearer tokens for [`CurrentUser`](crate::auth::CurrentUser).
    pub tokens: Arc<TokenAuthority>,
    /// Read-through cache for single-entity lookups.
    pub cache: Arc<dyn CacheClient>,
    /// Lifetime of cached lookups.
    pub cache_ttl: Duration,
    /// Keeps lookups that raced a write from filling the cache.
    pub cache_epochs: Arc<CacheEpochs>,
    /// Name reported by the health endpoint.
    pub service_name: Arc<str>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

impl FromRef<AppState> for Arc<TokenAuthority> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.tokens)
    }
}

/// State over a fresh in-memory database, with the database handle kept
/// for assertions.
#[cfg(test)]
pub(crate) fn test_state() -> (AppState, crate::storage::MemoryDatabase) {
    use crate::auth::TokenConfig;
    use crate::cache::{MemoryCache, DEFAULT_TTL};
    use crate::storage::MemoryDatabase;

    let db = MemoryDatabase::new();
    let state = AppState {
        factory: RepositoryFactory::new(Arc::new(db.clone()), Vec::new()),
        tokens: Arc::new(TokenAuthority::new(TokenConfig::new("test-secret"))),
        cache: Arc::new(MemoryCache::default()),
        cache_ttl: DEFAULT_TTL,
        cache_epochs: Arc::default(),
        service_name: Arc::from("test-service"),
        start_time: Instant::now(),
    };
    (state, db)
}
