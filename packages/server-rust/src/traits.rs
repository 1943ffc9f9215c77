use std::sync::Arc;

use async_trait::async_trait;
use common_core::{Entity, EntityId, Patch};

use crate::storage::{Record, StoreError};

/// Schema of one entity collection, registered once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Collection (table) name.
    pub name: &'static str,
    /// Entity fields that must be unique across the collection.
    pub unique_fields: &'static [&'static str],
}

impl CollectionSpec {
    /// Collection spec declared by an entity type.
    #[must_use]
    pub fn of<E: Entity>() -> Self {
        Self {
            name: E::COLLECTION,
            unique_fields: E::UNIQUE_FIELDS,
        }
    }
}

/// Request-scoped store handle.
///
/// Every call runs in its own implicit transaction and commits before it
/// returns; there is no batching across calls. A session is owned by one
/// request and must not be shared with concurrent requests.
#[async_trait]
pub trait Session: Send + Sync {
    /// Point lookup by primary key.
    async fn fetch(&self, collection: &str, id: EntityId) -> Result<Option<Record>, StoreError>;

    /// Range scan ordered by `(created_at, id)` ascending.
    async fn fetch_page(
        &self,
        collection: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError>;

    /// Inserts a record and returns it as stored.
    ///
    /// Fails with [`StoreError::Integrity`] on a duplicate key or a unique
    /// field collision; nothing is written in that case.
    async fn insert(&self, collection: &str, record: Record) -> Result<Record, StoreError>;

    /// Merges `patch` into the record's data, stamps `updated_at` with `now`,
    /// and returns the updated record, or `None` if no row matched.
    async fn update(
        &self,
        collection: &str,
        id: EntityId,
        patch: &Patch,
        now: i64,
    ) -> Result<Option<Record>, StoreError>;

    /// Deletes by primary key, returning the number of rows removed.
    async fn delete(&self, collection: &str, id: EntityId) -> Result<u64, StoreError>;

    /// Existence check without materializing the row.
    async fn contains(&self, collection: &str, id: EntityId) -> Result<bool, StoreError>;
}

/// Session handle shared by a repository and the service that owns it.
pub type SharedSession = Arc<dyn Session>;

/// Pluggable persistence backend, constructed once per process.
/// Implementations: `PostgreSQL` (feature `postgres`), memory.
#[async_trait]
pub trait Database: Send + Sync {
    /// Creates the collection if needed and installs its constraints.
    async fn register_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError>;

    /// Opens a request-scoped session.
    async fn session(&self) -> Result<SharedSession, StoreError>;

    /// Cheap reachability probe used by readiness checks.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Release resources and close connections.
    async fn close(&self) -> Result<(), StoreError>;
}
