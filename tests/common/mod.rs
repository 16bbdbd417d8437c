//! Shared test doubles for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use tokengate::core::{Property, Result, StoreError};
use tokengate::transaction::TransactionId;
use tokengate::{Gateway, GatewayConfig, PersistentStore, RequestContext, StoreConfig};

pub type JsonContent = Option<serde_json::Value>;

type GetFn = dyn Fn(&RequestContext, &str, &str) -> Result<(Vec<Property>, JsonContent)> + Send + Sync;
type SetFn = dyn Fn(&RequestContext, &str, &str, &[Property], JsonContent) -> Result<()> + Send + Sync;
type TransactFn = dyn Fn(&RequestContext) -> Result<()> + Send + Sync;

/// A [`PersistentStore`] whose every call is answered by a test-supplied
/// closure. Calls that were not scripted fail the test.
///
/// Content crosses the boundary as JSON so closures can inspect and supply it.
/// `transact` runs the hook first; an `Err` from the hook is returned without
/// running the body, otherwise the body runs exactly once with a context
/// carrying a fresh transaction id.
pub struct ScriptedStore {
    get: Arc<GetFn>,
    set: Arc<SetFn>,
    transact: Arc<TransactFn>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self {
            get: Arc::new(unexpected_get),
            set: Arc::new(unexpected_set),
            transact: Arc::new(unexpected_transact),
        }
    }

    pub fn on_get(
        mut self,
        f: impl Fn(&RequestContext, &str, &str) -> Result<(Vec<Property>, JsonContent)> + Send + Sync + 'static,
    ) -> Self {
        self.get = Arc::new(f);
        self
    }

    pub fn on_set(
        mut self,
        f: impl Fn(&RequestContext, &str, &str, &[Property], JsonContent) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.set = Arc::new(f);
        self
    }

    pub fn on_transact(mut self, f: impl Fn(&RequestContext) -> Result<()> + Send + Sync + 'static) -> Self {
        self.transact = Arc::new(f);
        self
    }

    /// Allow transactions and run their bodies.
    pub fn transactional(self) -> Self {
        self.on_transact(|_| Ok(()))
    }
}

fn unexpected_get(_: &RequestContext, kind: &str, key: &str) -> Result<(Vec<Property>, JsonContent)> {
    panic!("get should not be called (kind {kind}, key {key})")
}

fn unexpected_set(_: &RequestContext, kind: &str, key: &str, _: &[Property], _: JsonContent) -> Result<()> {
    panic!("set should not be called (kind {kind}, key {key})")
}

fn unexpected_transact(_: &RequestContext) -> Result<()> {
    panic!("transact should not be called")
}

#[async_trait]
impl PersistentStore for ScriptedStore {
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
        let (properties, json) = (self.get)(ctx, kind, key)?;
        if let (Some(target), Some(json)) = (content, json) {
            *target = serde_json::from_value(json).map_err(|e| StoreError::Deserialization(e.to_string()))?;
        }
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
        let json = content
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        (self.set)(ctx, kind, key, properties, json)
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
        (self.transact)(ctx)?;
        f(ctx.with_transaction(TransactionId::new())).await
    }
}

/// Gateway over a fresh in-memory engine, billing `/api/entity` as endpoint `entity`.
pub fn gateway() -> Gateway {
    let config = GatewayConfig::new()
        .endpoint("/api/entity", "entity")
        .store(StoreConfig::new().namespace("test"));
    match Gateway::in_memory(&config) {
        Ok(gateway) => gateway,
        Err(err) => panic!("gateway: {err}"),
    }
}

pub fn limit_properties(limit: i64) -> (Vec<Property>, JsonContent) {
    (vec![Property::new("Limit", limit)], None)
}

pub fn usage_content(count: i64) -> (Vec<Property>, JsonContent) {
    (Vec::new(), Some(serde_json::json!({ "Count": count })))
}
