//! Prefixed key/value cache for values that can be recomputed on a miss.

use super::{Codec, ContentCodec};
use crate::context::RequestContext;
use crate::core::{Result, StoreError};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A best-effort cache. Absent keys are reported as [`StoreError::CacheMiss`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get<T>(&self, ctx: &RequestContext, key: &str) -> Result<T>
    where
        T: DeserializeOwned + Send;

    async fn set<T>(&self, ctx: &RequestContext, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync;

    /// Remove one key. Deleting an absent key is a `CacheMiss`.
    async fn delete(&self, ctx: &RequestContext, key: &str) -> Result<()>;

    /// Drop every cached item, across all prefixes sharing the backend.
    async fn flush(&self, ctx: &RequestContext) -> Result<()>;
}

/// In-process [`CacheStore`]. Values are stored encoded with `C`.
///
/// Clones and [`prefixed`](MemoryCache::prefixed) views share one backend.
#[derive(Clone)]
pub struct MemoryCache<C = ContentCodec> {
    items: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    prefix: String,
    codec: C,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_codec(ContentCodec::default())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec + Clone> MemoryCache<C> {
    pub fn with_codec(codec: C) -> Self {
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
            prefix: String::new(),
            codec,
        }
    }

    /// A view over the same backend whose keys are prepended with `prefix`.
    pub fn prefixed(&self, prefix: impl Into<String>) -> Self {
        Self {
            items: self.items.clone(),
            prefix: prefix.into(),
            codec: self.codec.clone(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of items in the shared backend
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl<C> CacheStore for MemoryCache<C>
where
    C: Codec + Clone + Send + Sync,
{
    async fn get<T>(&self, ctx: &RequestContext, key: &str) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        ctx.ensure_live()?;
        debug!(parent: ctx.span(), prefix = %self.prefix, key, "cache get");

        let items = self.items.read().await;
        let bytes = items.get(&self.full_key(key)).ok_or(StoreError::CacheMiss)?;
        self.codec.decode(bytes)
    }

    async fn set<T>(&self, ctx: &RequestContext, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        ctx.ensure_live()?;
        debug!(parent: ctx.span(), prefix = %self.prefix, key, "cache set");

        let bytes = self.codec.encode(value)?;
        self.items.write().await.insert(self.full_key(key), bytes);
        Ok(())
    }

    async fn delete(&self, ctx: &RequestContext, key: &str) -> Result<()> {
        ctx.ensure_live()?;
        debug!(parent: ctx.span(), prefix = %self.prefix, key, "cache delete");

        self.items
            .write()
            .await
            .remove(&self.full_key(key))
            .map(|_| ())
            .ok_or(StoreError::CacheMiss)
    }

    async fn flush(&self, ctx: &RequestContext) -> Result<()> {
        ctx.ensure_live()?;
        debug!(parent: ctx.span(), "cache clear - full purge");

        self.items.write().await.clear();
        Ok(())
    }
}
