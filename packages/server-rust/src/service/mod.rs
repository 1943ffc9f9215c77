//! Business-logic layer.
//!
//! - [`CrudService`]: generic create/get/list/update/delete over one repository
//! - [`RepositoryFactory`]: builds request-scoped repository/service pairs
//! - [`observe`]: tracing spans and metrics around every operation

pub mod crud;
pub mod factory;
pub mod observe;

pub use crud::CrudService;
pub use factory::RepositoryFactory;
pub use observe::CrudOp;
