//! Factory for creating fully-wired [`Repository`] and [`CrudService`] instances.
//!
//! [`RepositoryFactory`] is the dependency injection point: it holds the
//! process-wide [`Database`], the registered mutation observers and the clock,
//! and builds one request-scoped repository/service pair per call.

use std::sync::Arc;

use common_core::{ClockSource, CreateMessage, Entity, SystemClock, UpdateMessage};

use super::CrudService;
use crate::repository::Repository;
use crate::storage::{CompositeMutationObserver, MutationObserver, StoreError};
use crate::traits::{CollectionSpec, Database, SharedSession};

/// Builds request-scoped repositories and services over one database.
#[derive(Clone)]
pub struct RepositoryFactory {
    database: Arc<dyn Database>,
    observer: Arc<CompositeMutationObserver>,
    clock: Arc<dyn ClockSource>,
}

impl RepositoryFactory {
    /// Creates a factory with the given observers and the system clock.
    #[must_use]
    pub fn new(database: Arc<dyn Database>, observers: Vec<Arc<dyn MutationObserver>>) -> Self {
        Self {
            database,
            observer: Arc::new(CompositeMutationObserver::new(observers)),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock handed to every repository and service.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }

    /// The shared database.
    #[must_use]
    pub fn database(&self) -> &Arc<dyn Database> {
        &self.database
    }

    /// Creates the collection for `E` and its unique constraints.
    ///
    /// # Errors
    ///
    /// Returns the store failure if the collection cannot be created.
    pub async fn register<E: Entity>(&self) -> Result<(), StoreError> {
        let spec = CollectionSpec::of::<E>();
        self.database.register_collection(&spec).await?;
        tracing::info!(
            resource = E::RESOURCE,
            collection = spec.name,
            unique = ?spec.unique_fields,
            "collection registered"
        );
        Ok(())
    }

    /// Repository for `E` bound to `session`.
    #[must_use]
    pub fn repository<E: Entity>(&self, session: SharedSession) -> Repository<E> {
        Repository::new(session)
            .with_observer(Arc::clone(&self.observer) as Arc<dyn MutationObserver>)
            .with_clock(Arc::clone(&self.clock))
    }

    /// Opens a session and builds a service and repository pair over it.
    ///
    /// # Errors
    ///
    /// Returns the store failure if no session can be opened.
    pub async fn service<E, C, U, R>(&self) -> Result<CrudService<E, C, U, R>, StoreError>
    where
        E: Entity,
        C: CreateMessage<E>,
        U: UpdateMessage,
        R: From<E>,
    {
        let session = self.database.session().await?;
        let repository = self.repository::<E>(Arc::clone(&session));
        Ok(CrudService::new(session, repository).with_clock(Arc::clone(&self.clock)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use common_core::{EntityId, ManualClock, Patch};

    use super::*;
    use crate::storage::{MemoryDatabase, Record};
    use crate::test_support::{CreateWidget, UpdateWidget, Widget, WidgetResponse};

    #[derive(Default)]
    struct CountingObserver {
        inserts: AtomicUsize,
    }

    impl MutationObserver for CountingObserver {
        fn on_insert(&self, _: &str, _: &Record) {
            self.inserts.fetch_add(1, Ordering::Relaxed);
        }
        fn on_update(&self, _: &str, _: &Record, _: &Patch) {}
        fn on_delete(&self, _: &str, _: EntityId) {}
    }

    #[tokio::test]
    async fn services_share_the_database_and_observers() {
        let observer = Arc::new(CountingObserver::default());
        let factory = RepositoryFactory::new(
            Arc::new(MemoryDatabase::new()),
            vec![Arc::clone(&observer) as Arc<dyn MutationObserver>],
        )
        .with_clock(Arc::new(ManualClock::new(42)));
        factory.register::<Widget>().await.unwrap();

        let writer = factory
            .service::<Widget, CreateWidget, UpdateWidget, WidgetResponse>()
            .await
            .unwrap();
        let created = writer.create(CreateWidget::named("A")).await.unwrap();
        assert_eq!(created.created_at, 42);

        let reader = factory
            .service::<Widget, CreateWidget, UpdateWidget, WidgetResponse>()
            .await
            .unwrap();
        assert_eq!(reader.get_by_id(created.id).await.unwrap(), created);
        assert_eq!(observer.inserts.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let factory = RepositoryFactory::new(Arc::new(MemoryDatabase::new()), Vec::new());
        factory.register::<Widget>().await.unwrap();
        factory.register::<Widget>().await.unwrap();
        factory.database().ping().await.unwrap();
    }
}
