//! Persistence layer.
//!
//! - [`Record`]: store-native row shape shared by all backends
//! - [`engines`]: in-process backends ([`MemoryDatabase`])
//! - [`datastores`]: SQL backends (`PostgresDatabase`, feature `postgres`)
//! - [`MutationObserver`]: hooks fired after successful writes

pub mod datastores;
pub mod engines;
pub mod error;
pub mod mutation_observer;
pub mod record;

pub use engines::MemoryDatabase;
pub use error::StoreError;
pub use mutation_observer::*;
pub use record::Record;
