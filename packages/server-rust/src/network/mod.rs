//! HTTP boundary: configuration, middleware, handlers and server lifecycle.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;

pub use config::*;
pub use handlers::{crud_router, ApiError, AppState};
pub use module::NetworkModule;
