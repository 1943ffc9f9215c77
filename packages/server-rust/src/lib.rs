//! Common server: generic CRUD repository and service over pluggable store
//! engines, with bearer-token auth, a cache client and the HTTP boundary.

pub mod auth;
pub mod cache;
pub mod config;
pub mod demo;
pub mod logging;
pub mod network;
pub mod repository;
pub mod service;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use config::AppConfig;
pub use repository::Repository;
pub use service::{CrudService, RepositoryFactory};
pub use traits::{CollectionSpec, Database, Session, SharedSession};
