use super::{EntityKey, StorageEngine};
use crate::core::{Property, Result, StoreError};
use crate::transaction::{Change, TransactionId, TransactionManager};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredEntity {
    version: u64,
    properties: Vec<Property>,
}

/// In-process engine with optimistic, serializable transactions.
pub struct MemoryEngine {
    entities: RwLock<HashMap<EntityKey, StoredEntity>>,
    transactions: TransactionManager,
    /// Version 0 is reserved for "absent".
    next_version: AtomicU64,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            transactions: TransactionManager::new(),
            next_version: AtomicU64::new(1),
        }
    }

    /// Number of stored entities
    pub async fn entity_count(&self) -> usize {
        self.entities.read().await.len()
    }

    /// Stored keys of a kind, sorted
    pub async fn keys_of_kind(&self, kind: &str) -> Vec<EntityKey> {
        let entities = self.entities.read().await;
        let mut keys: Vec<EntityKey> = entities.keys().filter(|k| k.kind == kind).cloned().collect();
        keys.sort();
        keys
    }

    pub async fn active_transactions(&self) -> usize {
        self.transactions.active_count().await
    }

    fn bump_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::SeqCst)
    }

    fn apply(&self, entities: &mut HashMap<EntityKey, StoredEntity>, change: Change) {
        let (key, properties) = change.into_parts();
        let version = self.bump_version();
        entities.insert(key, StoredEntity { version, properties });
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageEngine for MemoryEngine {
    async fn get(&self, txn: Option<TransactionId>, key: &EntityKey) -> Result<Option<Vec<Property>>> {
        let Some(txn_id) = txn else {
            let entities = self.entities.read().await;
            return Ok(entities.get(key).map(|e| e.properties.clone()));
        };

        let buffered = self
            .transactions
            .with_transaction(txn_id, |t| Ok(t.pending_write(key).map(<[Property]>::to_vec)))
            .await?;
        if buffered.is_some() {
            return Ok(buffered);
        }

        // Hold the read lock until the version is recorded so a concurrent
        // commit cannot slip in between.
        let entities = self.entities.read().await;
        let stored = entities.get(key);
        let version = stored.map(|e| e.version).unwrap_or(0);
        self.transactions
            .with_transaction(txn_id, |t| t.record_read(key.clone(), version))
            .await?;

        Ok(stored.map(|e| e.properties.clone()))
    }

    async fn put(&self, txn: Option<TransactionId>, key: EntityKey, properties: Vec<Property>) -> Result<()> {
        let change = Change::put(key, properties);
        match txn {
            Some(txn_id) => {
                self.transactions
                    .with_transaction(txn_id, |t| t.record_change(change))
                    .await
            }
            None => {
                let mut entities = self.entities.write().await;
                self.apply(&mut entities, change);
                Ok(())
            }
        }
    }

    async fn begin(&self) -> Result<TransactionId> {
        Ok(self.transactions.begin().await)
    }

    async fn commit(&self, txn_id: TransactionId) -> Result<()> {
        let mut transaction = self.transactions.take(txn_id).await?;
        let mut entities = self.entities.write().await;

        let stale = transaction.read_versions().iter().any(|(key, seen)| {
            let current = entities.get(key).map(|e| e.version).unwrap_or(0);
            current != *seen
        });
        if stale {
            transaction.rollback()?;
            return Err(StoreError::Conflict);
        }

        for change in transaction.commit()? {
            self.apply(&mut entities, change);
        }
        Ok(())
    }

    async fn rollback(&self, txn_id: TransactionId) -> Result<()> {
        self.transactions.rollback(txn_id).await
    }
}
