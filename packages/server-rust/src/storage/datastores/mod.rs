//! SQL-backed [`Database`](crate::traits::Database) implementations.

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresDatabase, PostgresSession};
