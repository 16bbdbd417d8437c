// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Optimistic transactions for the in-memory engine: reads record versions,
// writes are buffered, commit validates the read set atomically.
//
// ============================================================================

pub mod change;
pub mod manager;
pub mod state;

pub use change::Change;
pub use manager::TransactionManager;
pub use state::{Transaction, TransactionId, TransactionState};
