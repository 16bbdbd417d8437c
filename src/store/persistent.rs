use crate::context::RequestContext;
use crate::core::{Property, Result, StoreError};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;

/// Content type for calls that neither read nor write opaque content.
pub type NoContent = ();

/// Get/Set/Transact over `(kind, key)` entities.
///
/// Consumers are generic over this trait so tests can substitute a scripted store.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Fetch an entity. With `Some(target)` the entity must carry content,
    /// which is decoded into `target`; with `None` it must not.
    async fn get_entity<T>(
        &self,
        ctx: &RequestContext,
        kind: &str,
        key: &str,
        content: Option<&mut T>,
    ) -> Result<Vec<Property>>
    where
        T: DeserializeOwned + Send;

    /// Replace an entity's properties and content.
    async fn put_entity<T>(
        &self,
        ctx: &RequestContext,
        kind: &str,
        key: &str,
        properties: &[Property],
        content: Option<&T>,
    ) -> Result<()>
    where
        T: Serialize + Sync;

    /// Run `f` atomically. `f` receives a context bound to the transaction and
    /// may be invoked more than once when commits contend.
    async fn transact<F, Fut, R>(&self, ctx: &RequestContext, f: F) -> Result<R>
    where
        F: FnMut(RequestContext) -> Fut + Send,
        Fut: Future<Output = Result<R>> + Send,
        R: Send;

    async fn get(&self, ctx: &RequestContext, kind: &str, key: &str) -> Result<Vec<Property>> {
        self.get_entity::<NoContent>(ctx, kind, key, None).await
    }

    async fn set(&self, ctx: &RequestContext, kind: &str, key: &str, properties: &[Property]) -> Result<()> {
        self.put_entity::<NoContent>(ctx, kind, key, properties, None).await
    }

    /// Whether the entity is present. Absence (or a read denial) is `Ok(false)`.
    async fn exists(&self, ctx: &RequestContext, kind: &str, key: &str) -> Result<bool> {
        match self.get(ctx, kind, key).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
