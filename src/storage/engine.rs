use crate::core::{Property, Result};
use crate::transaction::TransactionId;
use async_trait::async_trait;

/// Fully qualified engine key: namespace partition, entity kind, prefixed name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub namespace: String,
    pub kind: String,
    pub name: String,
}

impl EntityKey {
    pub fn new(namespace: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// Transactional keyed-property store - allows pluggable backends.
///
/// Passing `Some(txn)` routes the call through that transaction; `None` is a
/// direct, non-transactional round-trip.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Fetch an entity's stored property list, `None` if it does not exist.
    async fn get(&self, txn: Option<TransactionId>, key: &EntityKey) -> Result<Option<Vec<Property>>>;

    /// Replace an entity's stored property list.
    async fn put(&self, txn: Option<TransactionId>, key: EntityKey, properties: Vec<Property>) -> Result<()>;

    async fn begin(&self) -> Result<TransactionId>;

    /// Apply a transaction atomically. Fails with `StoreError::Conflict` when
    /// another transaction changed something this one read.
    async fn commit(&self, txn: TransactionId) -> Result<()>;

    async fn rollback(&self, txn: TransactionId) -> Result<()>;
}
