// ============================================================================
// Transaction Manager
// ============================================================================

use super::{Transaction, TransactionId};
use crate::core::{Result, StoreError};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Registry of in-flight transactions.
pub struct TransactionManager {
    transactions: Mutex<HashMap<TransactionId, Transaction>>,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            transactions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn begin(&self) -> TransactionId {
        let id = TransactionId::new();
        let mut transactions = self.transactions.lock().await;
        transactions.insert(id, Transaction::new(id));
        id
    }

    /// Run `f` against an active transaction while holding the registry lock.
    pub async fn with_transaction<R>(
        &self,
        txn_id: TransactionId,
        f: impl FnOnce(&mut Transaction) -> Result<R>,
    ) -> Result<R> {
        let mut transactions = self.transactions.lock().await;
        let transaction = transactions
            .get_mut(&txn_id)
            .ok_or_else(|| StoreError::Transport(format!("Transaction {} not found", txn_id)))?;
        f(transaction)
    }

    /// Remove a transaction from the registry so it can be committed.
    pub async fn take(&self, txn_id: TransactionId) -> Result<Transaction> {
        let mut transactions = self.transactions.lock().await;
        transactions
            .remove(&txn_id)
            .ok_or_else(|| StoreError::Transport(format!("Transaction {} not found", txn_id)))
    }

    /// Discard a transaction. Unknown ids are ignored so rollback is idempotent.
    pub async fn rollback(&self, txn_id: TransactionId) -> Result<()> {
        let mut transactions = self.transactions.lock().await;
        if let Some(mut transaction) = transactions.remove(&txn_id) {
            transaction.rollback()?;
        }
        Ok(())
    }

    pub async fn active_count(&self) -> usize {
        self.transactions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::EntityKey;

    #[tokio::test]
    async fn test_begin_and_take() {
        let manager = TransactionManager::new();
        let id = manager.begin().await;
        assert_eq!(manager.active_count().await, 1);

        let txn = manager.take(id).await.unwrap();
        assert_eq!(txn.id(), id);
        assert_eq!(manager.active_count().await, 0);
        assert!(manager.take(id).await.is_err());
    }

    #[tokio::test]
    async fn test_with_transaction_mutates_in_place() {
        let manager = TransactionManager::new();
        let id = manager.begin().await;

        manager
            .with_transaction(id, |txn| txn.record_read(EntityKey::new("", "K", "a"), 4))
            .await
            .unwrap();

        let txn = manager.take(id).await.unwrap();
        assert_eq!(txn.read_versions().len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_is_idempotent() {
        let manager = TransactionManager::new();
        let id = manager.begin().await;

        manager.rollback(id).await.unwrap();
        manager.rollback(id).await.unwrap();
        assert_eq!(manager.active_count().await, 0);
    }
}
