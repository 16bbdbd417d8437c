// ============================================================================
// Transaction State Management
// ============================================================================
//
// Each transaction moves through Active -> Committed/Aborted.
//
// Optimistic concurrency:
// - Every entity read inside the transaction records the version it saw
// - Writes are buffered until commit
// - Commit succeeds only if none of the recorded versions changed
//
// ============================================================================

use super::Change;
use crate::core::{Property, Result, StoreError};
use crate::storage::EntityKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Transaction state
///
/// State transitions:
/// ```text
/// Active ──commit──> Committed
///   │
///   └──rollback──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// An optimistic transaction: a read set of observed versions plus buffered writes.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,

    /// Version of each entity when first read; 0 means the entity was absent.
    read_versions: HashMap<EntityKey, u64>,

    changes: Vec<Change>,
}

impl Transaction {
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            read_versions: HashMap::new(),
            changes: Vec::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn read_versions(&self) -> &HashMap<EntityKey, u64> {
        &self.read_versions
    }

    /// Remember the version seen by the first read of `key`.
    pub fn record_read(&mut self, key: EntityKey, version: u64) -> Result<()> {
        self.ensure_active("record read")?;
        self.read_versions.entry(key).or_insert(version);
        Ok(())
    }

    pub fn record_change(&mut self, change: Change) -> Result<()> {
        self.ensure_active("record change")?;
        self.changes.push(change);
        Ok(())
    }

    /// Latest buffered write for `key`, if this transaction wrote it.
    pub fn pending_write(&self, key: &EntityKey) -> Option<&[Property]> {
        self.changes
            .iter()
            .rev()
            .find(|c| c.key() == key)
            .map(Change::properties)
    }

    /// Mark committed and hand back the buffered writes, in order.
    pub fn commit(&mut self) -> Result<Vec<Change>> {
        self.ensure_active("commit")?;
        self.state = TransactionState::Committed;
        Ok(std::mem::take(&mut self.changes))
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_active("rollback")?;
        self.changes.clear();
        self.read_versions.clear();
        self.state = TransactionState::Aborted;
        Ok(())
    }

    fn ensure_active(&self, action: &str) -> Result<()> {
        if !self.state.is_active() {
            return Err(StoreError::Transport(format!(
                "Cannot {}: transaction {} is {}",
                action, self.id, self.state
            )));
        }
        Ok(())
    }
}
