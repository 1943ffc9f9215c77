//! Mutation observer trait and composite implementation.
//!
//! Defines [`MutationObserver`] for reacting to committed writes made
//! through a [`Repository`](crate::repository::Repository), and
//! [`CompositeMutationObserver`] which fans out notifications to multiple
//! observers.

use std::sync::Arc;

use common_core::{EntityId, Patch};

use super::record::Record;

/// Observer for committed repository writes.
///
/// Implementations can audit changes, invalidate caches, or publish change
/// events. Called only after the store accepted the write.
///
/// Used as `Arc<dyn MutationObserver>`.
pub trait MutationObserver: Send + Sync {
    /// Called after a new record is inserted.
    fn on_insert(&self, collection: &str, record: &Record);

    /// Called after a record is updated with `patch`.
    fn on_update(&self, collection: &str, record: &Record, patch: &Patch);

    /// Called after a record is deleted.
    fn on_delete(&self, collection: &str, id: EntityId);
}

/// Composite observer that fans out to multiple observers.
#[derive(Default)]
pub struct CompositeMutationObserver {
    observers: Vec<Arc<dyn MutationObserver>>,
}

impl CompositeMutationObserver {
    /// Creates a composite observer with the given list of observers.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn MutationObserver>>) -> Self {
        Self { observers }
    }

    /// Adds an observer after construction.
    pub fn add(&mut self, observer: Arc<dyn MutationObserver>) {
        self.observers.push(observer);
    }

    /// True if no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl MutationObserver for CompositeMutationObserver {
    fn on_insert(&self, collection: &str, record: &Record) {
        for observer in &self.observers {
            observer.on_insert(collection, record);
        }
    }

    fn on_update(&self, collection: &str, record: &Record, patch: &Patch) {
        for observer in &self.observers {
            observer.on_update(collection, record, patch);
        }
    }

    fn on_delete(&self, collection: &str, id: EntityId) {
        for observer in &self.observers {
            observer.on_delete(collection, id);
        }
    }
}

/// Emits one structured audit event per committed write.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMutationObserver;

impl MutationObserver for TracingMutationObserver {
    fn on_insert(&self, collection: &str, record: &Record) {
        tracing::info!(
            target: "audit",
            collection,
            id = %record.meta.id,
            created_at = record.meta.created_at,
            "record inserted"
        );
    }

    fn on_update(&self, collection: &str, record: &Record, patch: &Patch) {
        let fields: Vec<&str> = patch.iter().map(|(field, _)| field.as_str()).collect();
        tracing::info!(
            target: "audit",
            collection,
            id = %record.meta.id,
            fields = ?fields,
            "record updated"
        );
    }

    fn on_delete(&self, collection: &str, id: EntityId) {
        tracing::info!(target: "audit", collection, id = %id, "record deleted");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use common_core::EntityMeta;
    use serde_json::Map;

    use super::*;

    /// Test observer that counts how many times each method is called.
    #[derive(Default)]
    struct CountingObserver {
        inserts: AtomicUsize,
        updates: AtomicUsize,
        deletes: AtomicUsize,
    }

    impl MutationObserver for CountingObserver {
        fn on_insert(&self, _: &str, _: &Record) {
            self.inserts.fetch_add(1, Ordering::Relaxed);
        }
        fn on_update(&self, _: &str, _: &Record, _: &Patch) {
            self.updates.fetch_add(1, Ordering::Relaxed);
        }
        fn on_delete(&self, _: &str, _: EntityId) {
            self.deletes.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn make_test_record() -> Record {
        Record::new(EntityMeta::new(1_000), Map::new())
    }

    #[test]
    fn empty_composite_does_not_panic() {
        let composite = CompositeMutationObserver::default();
        let record = make_test_record();

        assert!(composite.is_empty());
        composite.on_insert("widgets", &record);
        composite.on_update("widgets", &record, &Patch::new());
        composite.on_delete("widgets", record.meta.id);
    }

    #[test]
    fn multiple_observers_all_receive_notifications() {
        let obs1 = Arc::new(CountingObserver::default());
        let obs2 = Arc::new(CountingObserver::default());
        let composite = CompositeMutationObserver::new(vec![
            Arc::clone(&obs1) as Arc<dyn MutationObserver>,
            Arc::clone(&obs2) as Arc<dyn MutationObserver>,
        ]);
        let record = make_test_record();

        composite.on_insert("widgets", &record);
        composite.on_insert("widgets", &record);
        composite.on_update("widgets", &record, &Patch::new());
        composite.on_delete("widgets", record.meta.id);

        for obs in [&obs1, &obs2] {
            assert_eq!(obs.inserts.load(Ordering::Relaxed), 2);
            assert_eq!(obs.updates.load(Ordering::Relaxed), 1);
            assert_eq!(obs.deletes.load(Ordering::Relaxed), 1);
        }
    }

    #[test]
    fn add_observer_after_construction() {
        let mut composite = CompositeMutationObserver::default();
        let observer = Arc::new(CountingObserver::default());
        let record = make_test_record();

        composite.on_insert("widgets", &record);
        assert_eq!(observer.inserts.load(Ordering::Relaxed), 0);

        composite.add(Arc::clone(&observer) as Arc<dyn MutationObserver>);
        composite.on_insert("widgets", &record);
        assert_eq!(observer.inserts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn tracing_observer_is_silent_without_subscriber() {
        let record = make_test_record();
        TracingMutationObserver.on_insert("widgets", &record);
        TracingMutationObserver.on_delete("widgets", record.meta.id);
    }

    /// Verifies `Arc<dyn MutationObserver>` compiles (object safety).
    #[test]
    fn mutation_observer_is_object_safe() {
        fn _assert_object_safe(_: &Arc<dyn MutationObserver>) {}
    }
}
