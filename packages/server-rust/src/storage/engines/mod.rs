//! In-process [`Database`](crate::traits::Database) implementations.

mod memory;

pub use memory::{MemoryDatabase, MemorySession};
