//! In-memory [`Database`] implementation backed by [`DashMap`].
//!
//! Each collection lives in its own `DashMap` shard entry, so every session
//! call holds exactly one entry lock for its duration. That gives each call
//! the same atomicity a single-statement SQL transaction would have.
//! Suitable for development and tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common_core::{EntityId, Patch};
use dashmap::mapref::one::{Ref, RefMut};
use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::storage::{Record, StoreError};
use crate::traits::{CollectionSpec, Database, Session, SharedSession};

/// Rows of one collection plus the indexes the SQL backend would keep.
struct Collection {
    name: &'static str,
    unique_fields: &'static [&'static str],
    rows: HashMap<EntityId, Record>,
    /// Scan order for pagination.
    order: BTreeSet<(i64, EntityId)>,
    /// field -> text form of the value -> owning row.
    unique: HashMap<&'static str, HashMap<String, EntityId>>,
}

impl Collection {
    fn new(spec: &CollectionSpec) -> Self {
        Self {
            name: spec.name,
            unique_fields: spec.unique_fields,
            rows: HashMap::new(),
            order: BTreeSet::new(),
            unique: spec
                .unique_fields
                .iter()
                .map(|field| (*field, HashMap::new()))
                .collect(),
        }
    }

    /// Checks unique fields of `data` against every row other than `owner`.
    fn check_unique(&self, owner: EntityId, data: &Map<String, Value>) -> Result<(), StoreError> {
        for field in self.unique_fields {
            let Some(key) = unique_key(data, field) else {
                continue;
            };
            let taken = self
                .unique
                .get(field)
                .and_then(|index| index.get(&key))
                .is_some_and(|holder| *holder != owner);
            if taken {
                return Err(StoreError::integrity(
                    format!("{}_{field}_key", self.name),
                    format!("duplicate key value violates unique constraint on {field}: {key}"),
                ));
            }
        }
        Ok(())
    }

    fn index(&mut self, id: EntityId, data: &Map<String, Value>) {
        for field in self.unique_fields {
            if let Some(key) = unique_key(data, field) {
                if let Some(index) = self.unique.get_mut(field) {
                    index.insert(key, id);
                }
            }
        }
    }

    fn unindex(&mut self, data: &Map<String, Value>) {
        for field in self.unique_fields {
            if let Some(key) = unique_key(data, field) {
                if let Some(index) = self.unique.get_mut(field) {
                    index.remove(&key);
                }
            }
        }
    }
}

/// Index key for a unique field, mirroring Postgres `data->>'field'`:
/// strings index by their contents, other values by their JSON text, so
/// `1` and `"1"` collide. Null and absent values never collide.
fn unique_key(data: &Map<String, Value>, field: &str) -> Option<String> {
    match data.get(field)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// MemoryDatabase
// ---------------------------------------------------------------------------

/// In-memory database for tests and local development.
///
/// Cloning is cheap and every clone shares the same collections.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    collections: Arc<DashMap<String, Collection>>,
    closed: Arc<AtomicBool>,
}

impl MemoryDatabase {
    /// Creates an empty database with no registered collections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows stored in `collection`, or 0 if it is not registered.
    #[must_use]
    pub fn row_count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map_or(0, |entry| entry.rows.len())
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        ensure_open(&self.closed)
    }
}

fn ensure_open(closed: &AtomicBool) -> Result<(), StoreError> {
    if closed.load(Ordering::Acquire) {
        return Err(StoreError::Backend(anyhow::anyhow!("database is closed")));
    }
    Ok(())
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn register_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.collections
            .entry(spec.name.to_string())
            .or_insert_with(|| Collection::new(spec));
        Ok(())
    }

    async fn session(&self) -> Result<SharedSession, StoreError> {
        self.ensure_open()?;
        Ok(Arc::new(MemorySession {
            collections: Arc::clone(&self.collections),
            closed: Arc::clone(&self.closed),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_open()
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemorySession
// ---------------------------------------------------------------------------

/// Session over a [`MemoryDatabase`]. Every call commits immediately.
///
/// Closing the database fails every later call on sessions already handed
/// out.
pub struct MemorySession {
    collections: Arc<DashMap<String, Collection>>,
    closed: Arc<AtomicBool>,
}

impl MemorySession {
    fn read(&self, collection: &str) -> Result<Ref<'_, String, Collection>, StoreError> {
        ensure_open(&self.closed)?;
        self.collections
            .get(collection)
            .ok_or_else(|| unknown(collection))
    }

    fn write(&self, collection: &str) -> Result<RefMut<'_, String, Collection>, StoreError> {
        ensure_open(&self.closed)?;
        self.collections
            .get_mut(collection)
            .ok_or_else(|| unknown(collection))
    }
}

fn unknown(collection: &str) -> StoreError {
    StoreError::UnknownCollection {
        name: collection.to_string(),
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn fetch(&self, collection: &str, id: EntityId) -> Result<Option<Record>, StoreError> {
        let entry = self.read(collection)?;
        Ok(entry.rows.get(&id).cloned())
    }

    async fn fetch_page(
        &self,
        collection: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        let entry = self.read(collection)?;
        Ok(entry
            .order
            .iter()
            .skip(skip)
            .take(limit)
            .filter_map(|(_, id)| entry.rows.get(id).cloned())
            .collect())
    }

    async fn insert(&self, collection: &str, record: Record) -> Result<Record, StoreError> {
        let mut entry = self.write(collection)?;
        let id = record.meta.id;

        if entry.rows.contains_key(&id) {
            return Err(StoreError::integrity(
                format!("{collection}_pkey"),
                format!("duplicate key value violates primary key: {id}"),
            ));
        }
        entry.check_unique(id, &record.data)?;

        entry.index(id, &record.data);
        entry.order.insert((record.meta.created_at, id));
        entry.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: EntityId,
        patch: &Patch,
        now: i64,
    ) -> Result<Option<Record>, StoreError> {
        let mut entry = self.write(collection)?;
        let Some(current) = entry.rows.get(&id) else {
            return Ok(None);
        };

        let mut updated = current.clone();
        patch.apply_to(&mut updated.data);
        updated.meta.mark_updated(now);
        entry.check_unique(id, &updated.data)?;

        let previous = current.data.clone();
        entry.unindex(&previous);
        entry.index(id, &updated.data);
        entry.rows.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete(&self, collection: &str, id: EntityId) -> Result<u64, StoreError> {
        let mut entry = self.write(collection)?;
        let Some(removed) = entry.rows.remove(&id) else {
            return Ok(0);
        };
        entry.unindex(&removed.data);
        entry.order.remove(&(removed.meta.created_at, id));
        Ok(1)
    }

    async fn contains(&self, collection: &str, id: EntityId) -> Result<bool, StoreError> {
        let entry = self.read(collection)?;
        Ok(entry.rows.contains_key(&id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
