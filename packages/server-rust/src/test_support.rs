//! Fixtures shared by unit tests.

pub use crate::demo::{CreateWidget, UpdateWidget, Widget, WidgetResponse};
use crate::storage::MemoryDatabase;
use crate::traits::{CollectionSpec, Database, SharedSession};

/// A fresh database with the widget collection registered, plus a session.
pub async fn widget_session() -> (MemoryDatabase, SharedSession) {
    let db = MemoryDatabase::new();
    db.register_collection(&CollectionSpec::of::<Widget>())
        .await
        .unwrap();
    let session = db.session().await.unwrap();
    (db, session)
}
