//! Idempotent "make it so" operations over a [`PersistentStore`].

use crate::context::RequestContext;
use crate::core::{Property, Result, StoreError, Value};
use crate::store::PersistentStore;
use tracing::debug;

pub struct EntityHelper<S> {
    store: S,
}

impl<S: PersistentStore> EntityHelper<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create an empty entity unless one already exists. An existing entity
    /// is left untouched.
    ///
    /// With `transact` unset the read and the write are separate calls, which is
    /// only safe when the caller already excludes concurrent creators.
    pub async fn ensure_exists(&self, ctx: &RequestContext, kind: &str, key: &str, transact: bool) -> Result<()> {
        if !transact {
            return self.ensure_exists_in(ctx, kind, key).await;
        }
        self.store
            .transact(ctx, |tx| async move { self.ensure_exists_in(&tx, kind, key).await })
            .await
    }

    /// Make property `name` hold `value`, overwriting in place or appending.
    /// No write is issued when it already holds `value`.
    pub async fn ensure_property(
        &self,
        ctx: &RequestContext,
        kind: &str,
        key: &str,
        name: &str,
        value: impl Into<Value>,
        transact: bool,
    ) -> Result<()> {
        let value = value.into();
        if !transact {
            return self.ensure_property_in(ctx, kind, key, name, &value).await;
        }
        let value = &value;
        self.store
            .transact(ctx, |tx| async move {
                self.ensure_property_in(&tx, kind, key, name, value).await
            })
            .await
    }

    async fn ensure_exists_in(&self, ctx: &RequestContext, kind: &str, key: &str) -> Result<()> {
        match self.store.get(ctx, kind, key).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound) => {
                debug!(parent: ctx.span(), kind, key, "creating empty entity");
                self.store.set(ctx, kind, key, &[]).await
            }
            Err(err) => Err(err),
        }
    }

    async fn ensure_property_in(
        &self,
        ctx: &RequestContext,
        kind: &str,
        key: &str,
        name: &str,
        value: &Value,
    ) -> Result<()> {
        let mut properties = match self.store.get(ctx, kind, key).await {
            Ok(properties) => properties,
            Err(StoreError::NotFound) => Vec::new(),
            Err(err) => return Err(err),
        };

        match properties.iter_mut().find(|p| p.name == name) {
            Some(existing) if existing.value.as_ref() == Some(value) => return Ok(()),
            Some(existing) => existing.value = Some(value.clone()),
            None => properties.push(Property::new(name, value.clone())),
        }

        self.store.set(ctx, kind, key, &properties).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::storage::MemoryEngine;
    use crate::store::EntityStore;
    use std::sync::Arc;

    fn helper() -> EntityHelper<EntityStore> {
        let engine = Arc::new(MemoryEngine::new());
        EntityHelper::new(EntityStore::new(engine, &StoreConfig::new()))
    }

    #[tokio::test]
    async fn test_ensure_property_overwrites_in_place() {
        let helper = helper();
        let ctx = RequestContext::new();
        helper
            .store()
            .set(&ctx, "Cfg", "c", &[Property::new("A", 1i64), Property::new("B", 2i64)])
            .await
            .unwrap();

        helper.ensure_property(&ctx, "Cfg", "c", "A", 10i64, true).await.unwrap();
        helper.ensure_property(&ctx, "Cfg", "c", "C", "x", false).await.unwrap();

        let props = helper.store().get(&ctx, "Cfg", "c").await.unwrap();
        assert_eq!(
            props,
            vec![Property::new("A", 10i64), Property::new("B", 2i64), Property::new("C", "x")]
        );
    }

    #[tokio::test]
    async fn test_ensure_exists_in_transaction() {
        let helper = helper();
        let ctx = RequestContext::new();

        helper.ensure_exists(&ctx, "Thing", "t", true).await.unwrap();
        assert_eq!(helper.store().get(&ctx, "Thing", "t").await.unwrap(), vec![]);
    }
}
