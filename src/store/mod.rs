pub mod entity_store;
pub mod persistent;

pub use entity_store::EntityStore;
pub use persistent::{NoContent, PersistentStore};
