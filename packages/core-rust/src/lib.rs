//! Common core — error taxonomy, entity and message model, patches, paging,
//! and validators shared by every service.

pub mod clock;
pub mod entity;
pub mod error;
pub mod message;
pub mod page;
pub mod patch;
pub mod principal;
pub mod validate;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use entity::{Entity, EntityId, EntityMeta};
pub use error::{CrudError, Details, DomainError, ErrorKind};
pub use message::{CreateMessage, UpdateMessage};
pub use page::Page;
pub use patch::Patch;
pub use principal::Principal;

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
