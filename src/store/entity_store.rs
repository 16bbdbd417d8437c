use super::PersistentStore;
use crate::auth::PermissionChecker;
use crate::config::StoreConfig;
use crate::context::RequestContext;
use crate::core::{CONTENT_PROPERTY, Property, Result, StoreError, Value, validate_properties};
use crate::storage::{Codec, ContentCodec, EntityKey, StorageEngine};
use crate::transaction::TransactionId;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Namespaced entity store over a [`StorageEngine`], optionally gated by a
/// [`PermissionChecker`].
///
/// Cloning is cheap; clones share the engine.
#[derive(Clone)]
pub struct EntityStore {
    engine: Arc<dyn StorageEngine>,
    namespace: String,
    prefix: String,
    codec: ContentCodec,
    max_transaction_attempts: u32,
    permission_checker: Option<Arc<dyn PermissionChecker>>,
}

impl EntityStore {
    pub fn new(engine: Arc<dyn StorageEngine>, config: &StoreConfig) -> Self {
        Self {
            engine,
            namespace: config.namespace.clone(),
            prefix: config.key_prefix.clone(),
            codec: config.codec,
            max_transaction_attempts: config.max_transaction_attempts.max(1),
            permission_checker: None,
        }
    }

    /// A store sharing this one's engine whose reads and writes are authorized by `checker`.
    pub fn with_permission_checker(&self, checker: Arc<dyn PermissionChecker>) -> Self {
        let mut store = self.clone();
        store.permission_checker = Some(checker);
        store
    }

    pub fn is_gated(&self) -> bool {
        self.permission_checker.is_some()
    }

    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    /// Engine key for a logical `(kind, key)`: the configured prefix is prepended.
    pub fn make_key(&self, kind: &str, key: &str) -> EntityKey {
        EntityKey::new(self.namespace.as_str(), kind, format!("{}{}", self.prefix, key))
    }

    /// Remove the content property from `properties`, decoding it into `target`.
    /// Content and target must both be present or both absent.
    fn splice_content<T: DeserializeOwned>(&self, properties: &mut Vec<Property>, target: Option<&mut T>) -> Result<()> {
        let content_pos = properties.iter().rposition(|p| p.name == CONTENT_PROPERTY);
        match (content_pos, target) {
            (Some(pos), Some(target)) => {
                let blob = properties.remove(pos);
                let Some(Value::Blob(bytes)) = blob.value else {
                    return Err(StoreError::Deserialization(
                        "entity contained content property with incorrect type".into(),
                    ));
                };
                *target = self.codec.decode(&bytes)?;
                Ok(())
            }
            (Some(_), None) => Err(StoreError::Deserialization(
                "entity contained content to deserialize, but no content target was given".into(),
            )),
            (None, Some(_)) => Err(StoreError::Deserialization(
                "entity did not contain content to deserialize, but a content target was given".into(),
            )),
            (None, None) => Ok(()),
        }
    }

    async fn rollback_quietly(&self, ctx: &RequestContext, txn: TransactionId) {
        if let Err(err) = self.engine.rollback(txn).await {
            debug!(parent: ctx.span(), %txn, error = %err, "datastore rollback failed");
        }
    }
}

/// Rolls back a transaction whose `transact` future was dropped before it
/// committed or rolled back, e.g. when a request handler is aborted.
struct TransactionGuard {
    engine: Arc<dyn StorageEngine>,
    txn: Option<TransactionId>,
}

impl TransactionGuard {
    fn new(engine: Arc<dyn StorageEngine>, txn: TransactionId) -> Self {
        Self { engine, txn: Some(txn) }
    }

    fn disarm(&mut self) {
        self.txn = None;
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        let Some(txn) = self.txn.take() else {
            return;
        };

        // Rollback is async; hand it to the runtime we were dropped on.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(%txn, "transaction abandoned outside a runtime, not rolled back");
            return;
        };
        let engine = self.engine.clone();
        handle.spawn(async move {
            match engine.rollback(txn).await {
                Ok(()) => debug!(%txn, "abandoned transaction rolled back"),
                Err(err) => warn!(%txn, error = %err, "abandoned transaction rollback failed"),
            }
        });
    }
}

#[async_trait]
impl PersistentStore for EntityStore {
    async fn get_entity<T>(
        &self,
        ctx: &RequestContext,
        kind: &str,
        key: &str,
        content: Option<&mut T>,
    ) -> Result<Vec<Property>>
    where
        T: DeserializeOwned + Send,
    {
        ctx.ensure_live()?;
        debug!(parent: ctx.span(), prefix = %self.prefix, kind, key, "datastore get");

        if let Some(checker) = &self.permission_checker {
            // Denial looks exactly like absence so keys cannot be enumerated.
            if !checker.check_read(ctx, kind, key).await? {
                return Err(StoreError::NotFound);
            }
        }

        let entity_key = self.make_key(kind, key);
        let stored = ctx
            .run(self.engine.get(ctx.transaction(), &entity_key))
            .await
            .map_err(|e| e.context("get", kind, key))?;
        let mut properties = stored.ok_or(StoreError::NotFound)?;

        self.splice_content(&mut properties, content)
            .map_err(|e| e.context("get", kind, key))?;

        Ok(properties)
    }

    async fn put_entity<T>(
        &self,
        ctx: &RequestContext,
        kind: &str,
        key: &str,
        properties: &[Property],
        content: Option<&T>,
    ) -> Result<()>
    where
        T: Serialize + Sync,
    {
        ctx.ensure_live()?;
        debug!(parent: ctx.span(), prefix = %self.prefix, kind, key, "datastore set");

        if let Some(checker) = &self.permission_checker {
            if !checker.check_write(ctx, kind, key).await? {
                return Err(StoreError::AccessDenied);
            }
        }

        validate_properties(properties).map_err(|e| e.context("set", kind, key))?;

        let mut stored = properties.to_vec();
        if let Some(content) = content {
            let bytes = self.codec.encode(content).map_err(|e| e.context("set", kind, key))?;
            stored.push(Property {
                name: CONTENT_PROPERTY.to_string(),
                value: Some(Value::Blob(bytes)),
            });
        }

        let entity_key = self.make_key(kind, key);
        ctx.run(self.engine.put(ctx.transaction(), entity_key, stored))
            .await
            .map_err(|e| e.context("set", kind, key))
    }

    async fn exists(&self, ctx: &RequestContext, kind: &str, key: &str) -> Result<bool> {
        ctx.ensure_live()?;

        if let Some(checker) = &self.permission_checker {
            if !checker.check_read(ctx, kind, key).await? {
                return Ok(false);
            }
        }

        let entity_key = self.make_key(kind, key);
        let stored = ctx
            .run(self.engine.get(ctx.transaction(), &entity_key))
            .await
            .map_err(|e| e.context("get", kind, key))?;
        Ok(stored.is_some())
    }

    async fn transact<F, Fut, R>(&self, ctx: &RequestContext, mut f: F) -> Result<R>
    where
        F: FnMut(RequestContext) -> Fut + Send,
        Fut: Future<Output = Result<R>> + Send,
        R: Send,
    {
        if ctx.transaction().is_some() {
            return Err(StoreError::NestedTransaction);
        }

        debug!(parent: ctx.span(), "datastore transaction start");

        let mut attempt = 0;
        let result = loop {
            attempt += 1;

            let txn = match ctx.run(self.engine.begin()).await {
                Ok(txn) => txn,
                Err(err) => break Err(err),
            };

            let mut guard = TransactionGuard::new(self.engine.clone(), txn);

            let value = match f(ctx.with_transaction(txn)).await {
                Ok(value) => value,
                Err(err) => {
                    self.rollback_quietly(ctx, txn).await;
                    guard.disarm();
                    break Err(err);
                }
            };

            match ctx.run(self.engine.commit(txn)).await {
                Ok(()) => {
                    guard.disarm();
                    break Ok(value);
                }
                Err(StoreError::Conflict) if attempt < self.max_transaction_attempts => {
                    // A failed commit has already discarded the transaction.
                    guard.disarm();
                    debug!(parent: ctx.span(), attempt, "datastore transaction conflict, retrying");
                }
                Err(err) => {
                    // A cancelled commit may leave the transaction registered.
                    self.rollback_quietly(ctx, txn).await;
                    guard.disarm();
                    break Err(err);
                }
            }
        };

        debug!(parent: ctx.span(), attempt, ok = result.is_ok(), "datastore transaction end");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryEngine;

    fn store_with_prefix(prefix: &str) -> (Arc<MemoryEngine>, EntityStore) {
        let engine = Arc::new(MemoryEngine::new());
        let config = StoreConfig::new().namespace("unit").key_prefix(prefix);
        let store = EntityStore::new(engine.clone(), &config);
        (engine, store)
    }

    #[test]
    fn test_make_key_applies_prefix_and_namespace() {
        let (_, store) = store_with_prefix("v1:");
        let key = store.make_key("TokenLimit", "tok/search");
        assert_eq!(key, EntityKey::new("unit", "TokenLimit", "v1:tok/search"));
    }

    #[tokio::test]
    async fn test_prefixes_isolate_stores_on_one_engine() {
        let (engine, first) = store_with_prefix("a:");
        let second = EntityStore::new(engine.clone(), &StoreConfig::new().namespace("unit").key_prefix("b:"));
        let ctx = RequestContext::new();

        first.set(&ctx, "Thing", "k", &[Property::new("N", 1i64)]).await.unwrap();

        assert_eq!(second.get(&ctx, "Thing", "k").await, Err(StoreError::NotFound));
        assert_eq!(engine.entity_count().await, 1);
    }

    #[tokio::test]
    async fn test_content_is_not_returned_as_property() {
        let (engine, store) = store_with_prefix("");
        let ctx = RequestContext::new();

        store
            .put_entity(&ctx, "Doc", "d", &[Property::new("Title", "t")], Some(&vec![1, 2, 3]))
            .await
            .unwrap();

        let raw = engine.get(None, &store.make_key("Doc", "d")).await.unwrap().unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[1].name, CONTENT_PROPERTY);

        let mut content: Vec<i32> = Vec::new();
        let props = store.get_entity(&ctx, "Doc", "d", Some(&mut content)).await.unwrap();
        assert_eq!(props, vec![Property::new("Title", "t")]);
        assert_eq!(content, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_nested_transact_is_rejected() {
        let (_, store) = store_with_prefix("");
        let ctx = RequestContext::new();

        let res = store
            .transact(&ctx, |tx| {
                let store = store.clone();
                async move { store.transact(&tx, |_| async { Ok(()) }).await }
            })
            .await;
        assert_eq!(res, Err(StoreError::NestedTransaction));
    }
}
