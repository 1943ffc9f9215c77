//! Generic single-entity data access over a store [`Session`].
//!
//! The repository is the only component that touches store rows: it
//! translates entities to and from [`Record`]s and turns store integrity
//! violations into validation failures. It never decides that a missing row
//! is an error; that belongs to the service layer.

use std::marker::PhantomData;
use std::sync::Arc;

use common_core::entity::META_FIELDS;
use common_core::{ClockSource, CrudError, Details, DomainError, Entity, EntityId, Page, Patch, SystemClock};
use serde_json::Value;

use crate::storage::{CompositeMutationObserver, MutationObserver, Record, StoreError};
use crate::traits::SharedSession;

/// Data access for one entity type, bound to one request-scoped session.
pub struct Repository<E: Entity> {
    session: SharedSession,
    observer: Arc<dyn MutationObserver>,
    clock: Arc<dyn ClockSource>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Repository<E> {
    /// Creates a repository with no observers and the system clock.
    #[must_use]
    pub fn new(session: SharedSession) -> Self {
        Self {
            session,
            observer: Arc::new(CompositeMutationObserver::default()),
            clock: Arc::new(SystemClock),
            _entity: PhantomData,
        }
    }

    /// Replaces the mutation observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn MutationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replaces the clock used to stamp `updated_at`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }

    /// The session this repository runs on.
    #[must_use]
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Point lookup. Absence is `Ok(None)`, never an error.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Store`] if the store fails or the row cannot be
    /// decoded.
    pub async fn find_by_id(&self, id: EntityId) -> Result<Option<E>, CrudError> {
        let record = self
            .session
            .fetch(E::COLLECTION, id)
            .await
            .map_err(translate)?;
        record.map(from_record).transpose()
    }

    /// One page of entities ordered by `(created_at, id)`.
    ///
    /// # Errors
    ///
    /// Returns a validation failure for an out-of-range page, or
    /// [`CrudError::Store`] on a store failure.
    pub async fn find_all(&self, page: Page) -> Result<Vec<E>, CrudError> {
        let page = page.validate()?;
        let records = self
            .session
            .fetch_page(E::COLLECTION, page.skip, page.limit)
            .await
            .map_err(translate)?;
        records.into_iter().map(from_record).collect()
    }

    /// Inserts an unpersisted entity and returns it as stored.
    ///
    /// # Errors
    ///
    /// Returns a validation failure carrying the constraint text if the
    /// store rejects the row; nothing is written in that case.
    pub async fn save(&self, entity: E) -> Result<E, CrudError> {
        let record = to_record(&entity)?;
        let stored = self
            .session
            .insert(E::COLLECTION, record)
            .await
            .map_err(translate)?;
        self.observer.on_insert(E::COLLECTION, &stored);
        from_record(stored)
    }

    /// Applies only the keys in `patch` and stamps `updated_at`.
    ///
    /// The patch is merged into the current row and decoded as `E` before
    /// anything is written, so a patch that would leave an undecodable row
    /// (e.g. `null` in a required field) is refused up front.
    ///
    /// Returns `Ok(None)` if no row matched `id`.
    ///
    /// # Errors
    ///
    /// Returns a validation failure if the patched row would not be a valid
    /// `E` or breaks a constraint, or [`CrudError::Store`] on a store failure.
    pub async fn update_by_id(&self, id: EntityId, patch: &Patch) -> Result<Option<E>, CrudError> {
        let Some(current) = self
            .session
            .fetch(E::COLLECTION, id)
            .await
            .map_err(translate)?
        else {
            return Ok(None);
        };
        check_patched::<E>(current, patch)?;

        let now = self.clock.now_millis();
        let updated = self
            .session
            .update(E::COLLECTION, id, patch, now)
            .await
            .map_err(translate)?;
        match updated {
            Some(record) => {
                self.observer.on_update(E::COLLECTION, &record, patch);
                from_record(record).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Deletes the row for `id`, returning whether one was removed.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Store`] on a store failure.
    pub async fn delete_by_id(&self, id: EntityId) -> Result<bool, CrudError> {
        let removed = self
            .session
            .delete(E::COLLECTION, id)
            .await
            .map_err(translate)?;
        if removed > 0 {
            self.observer.on_delete(E::COLLECTION, id);
        }
        Ok(removed > 0)
    }

    /// Existence check that does not materialize the row.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Store`] on a store failure.
    pub async fn exists(&self, id: EntityId) -> Result<bool, CrudError> {
        self.session
            .contains(E::COLLECTION, id)
            .await
            .map_err(translate)
    }
}

// ---------------------------------------------------------------------------
// Row translation
// ---------------------------------------------------------------------------

fn to_record<E: Entity>(entity: &E) -> Result<Record, CrudError> {
    let value = serde_json::to_value(entity).map_err(|e| {
        CrudError::Store(anyhow::Error::new(e).context(format!("failed to encode {}", E::RESOURCE)))
    })?;
    let Value::Object(mut data) = value else {
        return Err(CrudError::Store(anyhow::anyhow!(
            "{} does not serialize to an object",
            E::RESOURCE
        )));
    };
    for field in META_FIELDS {
        data.remove(field);
    }
    Ok(Record::new(entity.meta().clone(), data))
}

fn decode<E: Entity>(record: Record) -> Result<E, serde_json::Error> {
    let Record { meta, mut data } = record;
    data.insert("id".to_string(), Value::String(meta.id.to_string()));
    data.insert("created_at".to_string(), meta.created_at.into());
    data.insert(
        "updated_at".to_string(),
        meta.updated_at.map_or(Value::Null, Value::from),
    );
    serde_json::from_value(Value::Object(data))
}

fn from_record<E: Entity>(record: Record) -> Result<E, CrudError> {
    let id = record.meta.id;
    decode(record).map_err(|e| {
        CrudError::Store(
            anyhow::Error::new(e).context(format!("failed to decode stored {} {id}", E::RESOURCE)),
        )
    })
}

/// Refuses a patch whose merge into `current` no longer decodes as `E`.
fn check_patched<E: Entity>(mut current: Record, patch: &Patch) -> Result<(), CrudError> {
    patch.apply_to(&mut current.data);
    match decode::<E>(current) {
        Ok(_) => Ok(()),
        Err(e) => {
            let mut details = Details::new();
            details.insert("error".to_string(), Value::String(e.to_string()));
            Err(DomainError::validation_with(
                format!("Invalid update for {}: {e}", E::RESOURCE),
                details,
            )
            .into())
        }
    }
}

/// Integrity violations are caller errors; everything else propagates.
fn translate(err: StoreError) -> CrudError {
    match err {
        StoreError::Integrity {
            constraint,
            message,
        } => {
            tracing::warn!(%constraint, error = %message, "store rejected write");
            let mut details = Details::new();
            details.insert("constraint".to_string(), Value::String(constraint));
            details.insert("error".to_string(), Value::String(message.clone()));
            DomainError::validation_with(
                format!("Database constraint violation: {message}"),
                details,
            )
            .into()
        }
        other => CrudError::Store(anyhow::Error::new(other)),
    }
}
