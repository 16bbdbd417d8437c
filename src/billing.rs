// ============================================================================
// Endpoint Billing
// ============================================================================
//
// Per (token, endpoint) usage limits. The limit lives in a `TokenLimit`
// entity; usage in a `TokenUsage` counter entity. A stale, unguarded read
// rejects callers that are clearly over quota; everyone else pays for one
// transactional read-increment-write.
//
// ============================================================================

use crate::auth::escape_segment;
use crate::context::RequestContext;
use crate::core::{Property, Result, StoreError, Value};
use crate::store::PersistentStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub const TOKEN_LIMIT_KIND: &str = "TokenLimit";
pub const TOKEN_USAGE_KIND: &str = "TokenUsage";
pub const LIMIT_PROPERTY: &str = "Limit";

/// Only shard 1 exists today.
const USAGE_SHARD: &str = "1";

/// Charges one unit of an API token's quota for a request path.
#[async_trait]
pub trait TokenBiller: Send + Sync {
    async fn bill(&self, ctx: &RequestContext, token: &str, path: &str) -> Result<()>;
}

/// Admin operation: set the quota for a token on an endpoint.
#[async_trait]
pub trait LimitedEndpointBiller: Send + Sync {
    async fn set_limit(&self, ctx: &RequestContext, token: &str, endpoint: &str, limit: i64) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(rename = "Count")]
    pub count: i64,
}

pub struct EndpointBiller<S> {
    store: S,
    url_endpoints: HashMap<String, String>,
}

impl<S: PersistentStore> EndpointBiller<S> {
    /// `url_endpoints` maps request paths to endpoint names; unmapped paths are never billable.
    pub fn new(store: S, url_endpoints: HashMap<String, String>) -> Self {
        Self { store, url_endpoints }
    }

    pub fn endpoint_for(&self, path: &str) -> Option<&str> {
        self.url_endpoints
            .get(path)
            .map(String::as_str)
            .filter(|e| !e.is_empty())
    }

    async fn limit(&self, ctx: &RequestContext, limit_key: &str) -> Result<i64> {
        let properties = match self.store.get(ctx, TOKEN_LIMIT_KIND, limit_key).await {
            Ok(properties) => properties,
            Err(StoreError::NotFound) => return Ok(0),
            Err(err) => return Err(err),
        };

        let mut limit = 0;
        for property in properties.iter().filter(|p| p.name == LIMIT_PROPERTY) {
            limit = match &property.value {
                Some(Value::Integer(n)) => *n,
                None => 0,
                Some(other) => {
                    return Err(StoreError::Deserialization(format!(
                        "limit property has type {}, expected integer",
                        other.type_name()
                    )));
                }
            };
        }
        Ok(limit)
    }

    /// Counter value read outside any transaction; may lag concurrent increments.
    async fn estimate_usage(&self, ctx: &RequestContext, usage_key: &str) -> Result<i64> {
        read_usage(&self.store, ctx, usage_key).await
    }

    async fn increment_usage(&self, ctx: &RequestContext, usage_key: &str) -> Result<()> {
        self.store
            .transact(ctx, |tx| async move {
                let mut usage = TokenUsage {
                    count: read_usage(&self.store, &tx, usage_key).await?,
                };
                usage.count += 1;
                self.store
                    .put_entity(&tx, TOKEN_USAGE_KIND, usage_key, &[], Some(&usage))
                    .await
            })
            .await
    }
}

async fn read_usage<S: PersistentStore>(store: &S, ctx: &RequestContext, usage_key: &str) -> Result<i64> {
    let mut usage = TokenUsage::default();
    match store
        .get_entity(ctx, TOKEN_USAGE_KIND, usage_key, Some(&mut usage))
        .await
    {
        Ok(_) => Ok(usage.count),
        Err(StoreError::NotFound) => Ok(0),
        Err(err) => Err(err),
    }
}

#[async_trait]
impl<S: PersistentStore> TokenBiller for EndpointBiller<S> {
    async fn bill(&self, ctx: &RequestContext, token: &str, path: &str) -> Result<()> {
        let Some(endpoint) = self.endpoint_for(path) else {
            debug!(parent: ctx.span(), path, "path is not a billable endpoint");
            return Err(StoreError::OutOfCredit);
        };

        let limit_key = limit_key(token, endpoint);
        let limit = self.limit(ctx, &limit_key).await?;
        if limit == 0 {
            return Err(StoreError::OutOfCredit);
        }

        let usage_key = usage_key(token, endpoint);
        let estimate = self.estimate_usage(ctx, &usage_key).await?;
        if estimate >= limit {
            debug!(parent: ctx.span(), endpoint, limit, estimate, "token over quota");
            return Err(StoreError::OutOfCredit);
        }

        self.increment_usage(ctx, &usage_key).await
    }
}

#[async_trait]
impl<S: PersistentStore> LimitedEndpointBiller for EndpointBiller<S> {
    async fn set_limit(&self, ctx: &RequestContext, token: &str, endpoint: &str, limit: i64) -> Result<()> {
        self.store
            .set(
                ctx,
                TOKEN_LIMIT_KIND,
                &limit_key(token, endpoint),
                &[Property::new(LIMIT_PROPERTY, limit)],
            )
            .await
    }
}

/// `token/endpoint`, each segment escaped.
pub fn limit_key(token: &str, endpoint: &str) -> String {
    format!("{}/{}", escape_segment(token), escape_segment(endpoint))
}

/// `token/endpoint/shard`.
pub fn usage_key(token: &str, endpoint: &str) -> String {
    format!("{}/{}", limit_key(token, endpoint), USAGE_SHARD)
}
