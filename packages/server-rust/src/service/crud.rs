//! Generic CRUD service composed with one [`Repository`].

use std::marker::PhantomData;
use std::sync::Arc;

use common_core::{
    ClockSource, CreateMessage, CrudError, DomainError, Entity, EntityId, EntityMeta, Page,
    SystemClock, UpdateMessage,
};

use super::observe::{instrumented, CrudOp};
use crate::repository::Repository;
use crate::traits::SharedSession;

/// Business-logic layer for entity `E`.
///
/// `C` builds new entities, `U` carries partial updates and `R` is the
/// outward projection. Responses are only ever built from entities the
/// repository returned, so they always carry the stored id and timestamps.
pub struct CrudService<E, C, U, R>
where
    E: Entity,
{
    session: SharedSession,
    repository: Repository<E>,
    clock: Arc<dyn ClockSource>,
    _messages: PhantomData<fn(C, U) -> R>,
}

impl<E, C, U, R> CrudService<E, C, U, R>
where
    E: Entity,
    C: CreateMessage<E>,
    U: UpdateMessage,
    R: From<E>,
{
    /// Builds a service over a repository bound to the same session.
    #[must_use]
    pub fn new(session: SharedSession, repository: Repository<E>) -> Self {
        Self {
            session,
            repository,
            clock: Arc::new(SystemClock),
            _messages: PhantomData,
        }
    }

    /// Replaces the clock for both the service and its repository.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.repository = self.repository.with_clock(Arc::clone(&clock));
        self.clock = clock;
        self
    }

    /// The session shared with the repository.
    #[must_use]
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// The underlying repository.
    #[must_use]
    pub fn repository(&self) -> &Repository<E> {
        &self.repository
    }

    /// Creates a new entity from `data`.
    ///
    /// # Errors
    ///
    /// Propagates the repository's validation failure if the store rejects
    /// the row, or a store failure.
    pub async fn create(&self, data: C) -> Result<R, CrudError> {
        instrumented(E::RESOURCE, CrudOp::Create, async {
            let meta = EntityMeta::new(self.clock.now_millis());
            tracing::info!(resource = E::RESOURCE, id = %meta.id, "creating");
            let stored = self.repository.save(data.into_entity(meta)).await?;
            Ok(R::from(stored))
        })
        .await
    }

    /// Fetches one entity.
    ///
    /// # Errors
    ///
    /// Returns a not-found failure naming the resource and `id` if absent.
    pub async fn get_by_id(&self, id: EntityId) -> Result<R, CrudError> {
        instrumented(E::RESOURCE, CrudOp::Get, async {
            tracing::debug!(resource = E::RESOURCE, %id, "fetching");
            self.repository
                .find_by_id(id)
                .await?
                .map(R::from)
                .ok_or_else(|| not_found::<E>(id))
        })
        .await
    }

    /// Fetches one page of entities ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns a validation failure for an out-of-range page.
    pub async fn get_all(&self, page: Page) -> Result<Vec<R>, CrudError> {
        instrumented(E::RESOURCE, CrudOp::List, async {
            tracing::debug!(
                resource = E::RESOURCE,
                skip = page.skip,
                limit = page.limit,
                "listing"
            );
            let entities = self.repository.find_all(page).await?;
            Ok(entities.into_iter().map(R::from).collect())
        })
        .await
    }

    /// Applies the explicitly set fields of `data` to entity `id`.
    ///
    /// An update that sets no field returns the current state unchanged.
    ///
    /// # Errors
    ///
    /// Returns a not-found failure if `id` does not exist before the update
    /// or disappears during it, and a validation failure if `data` names a
    /// server-assigned field or breaks a store constraint.
    pub async fn update(&self, id: EntityId, data: U) -> Result<R, CrudError> {
        instrumented(E::RESOURCE, CrudOp::Update, async {
            if !self.repository.exists(id).await? {
                return Err(not_found::<E>(id));
            }

            let patch = data.into_patch()?;
            tracing::info!(
                resource = E::RESOURCE,
                %id,
                fields = patch.len(),
                "updating"
            );
            if patch.is_empty() {
                return self
                    .repository
                    .find_by_id(id)
                    .await?
                    .map(R::from)
                    .ok_or_else(|| not_found::<E>(id));
            }

            // A concurrent delete between the existence check and the write
            // leaves nothing to update.
            self.repository
                .update_by_id(id, &patch)
                .await?
                .map(R::from)
                .ok_or_else(|| not_found::<E>(id))
        })
        .await
    }

    /// Deletes entity `id`.
    ///
    /// # Errors
    ///
    /// Returns a not-found failure if no row was removed.
    pub async fn delete(&self, id: EntityId) -> Result<bool, CrudError> {
        instrumented(E::RESOURCE, CrudOp::Delete, async {
            tracing::info!(resource = E::RESOURCE, %id, "deleting");
            if self.repository.delete_by_id(id).await? {
                Ok(true)
            } else {
                Err(not_found::<E>(id))
            }
        })
        .await
    }
}

fn not_found<E: Entity>(id: EntityId) -> CrudError {
    DomainError::not_found(Some(E::RESOURCE), Some(&id.to_string())).into()
}
