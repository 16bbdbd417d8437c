// ============================================================================
// Tokengate Library
// ============================================================================

pub mod auth;
pub mod billing;
pub mod config;
pub mod context;
pub mod core;
pub mod helper;
pub mod storage;
pub mod store;
pub mod transaction;
pub mod web;

// Re-export main types for convenience
pub use auth::{
    BaseContextMaker, ContextMaker, InboundRequest, PermissionChecker, ProjectPermissionChecker,
    ProjectTokenLister, TokenAuthenticator, TokenIssuer,
};
pub use billing::{EndpointBiller, LimitedEndpointBiller, TokenBiller};
pub use config::{GatewayConfig, StoreConfig};
pub use context::RequestContext;
pub use core::{Property, Result, StoreError, Value};
pub use helper::EntityHelper;
pub use storage::{CacheStore, MemoryCache, MemoryEngine, StorageEngine};
pub use store::{EntityStore, NoContent, PersistentStore};

use auth::ContextUserService;
use std::sync::Arc;

// ============================================================================
// Gateway
// ============================================================================

/// The wired system: one engine, an ungated store for grants, limits and
/// usage counters, and a permission-gated store for project data.
///
/// # Examples
///
/// ```
/// use tokengate::{Gateway, GatewayConfig, PersistentStore, Property, RequestContext, ProjectTokenLister};
///
/// # #[tokio::main]
/// # async fn main() -> tokengate::Result<()> {
/// let gateway = Gateway::in_memory(&GatewayConfig::new())?;
/// let admin = RequestContext::new();
/// let token = gateway.issuer().create_token(&admin, "acme").await?;
///
/// let ctx = RequestContext::new().with_token(token);
/// gateway.gated_store().set(&ctx, "Note", "acme/1", &[Property::new("Body", "hi")]).await?;
/// # Ok(())
/// # }
/// ```
pub struct Gateway {
    engine: Arc<dyn StorageEngine>,
    store: EntityStore,
    gated: EntityStore,
    biller: EndpointBiller<EntityStore>,
    issuer: TokenIssuer<EntityStore>,
    helper: EntityHelper<EntityStore>,
    admin_contexts: BaseContextMaker,
    authenticator: Arc<TokenAuthenticator>,
    expose_errors: bool,
}

impl Gateway {
    /// Wire a gateway over an existing engine
    pub fn new(engine: Arc<dyn StorageEngine>, config: &GatewayConfig) -> Result<Self> {
        config.validate()?;

        let mut admin_contexts = BaseContextMaker::new();
        if let Some(header) = config.user_header_name()? {
            admin_contexts = admin_contexts.user_header(header);
        }
        if let Some(timeout) = config.timeout() {
            admin_contexts = admin_contexts.timeout(timeout);
        }
        let authenticator = Arc::new(TokenAuthenticator::wrapping(Arc::new(admin_contexts.clone())));

        let store = EntityStore::new(engine.clone(), &config.store);
        let checker = ProjectPermissionChecker::new(store.clone())
            .with_user_service(Arc::new(ContextUserService))
            .with_token_authenticator(authenticator.clone());
        let gated = store.with_permission_checker(Arc::new(checker));

        Ok(Self {
            engine,
            biller: EndpointBiller::new(store.clone(), config.url_endpoints.clone()),
            issuer: TokenIssuer::new(store.clone()),
            helper: EntityHelper::new(gated.clone()),
            store,
            gated,
            admin_contexts,
            authenticator,
            expose_errors: config.expose_errors,
        })
    }

    /// Wire a gateway over a fresh [`MemoryEngine`]
    pub fn in_memory(config: &GatewayConfig) -> Result<Self> {
        Self::new(Arc::new(MemoryEngine::new()), config)
    }

    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    /// Store without permission checks
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Store whose reads and writes require a project grant
    pub fn gated_store(&self) -> &EntityStore {
        &self.gated
    }

    pub fn biller(&self) -> &EndpointBiller<EntityStore> {
        &self.biller
    }

    pub fn issuer(&self) -> &TokenIssuer<EntityStore> {
        &self.issuer
    }

    /// Helper over the gated store
    pub fn helper(&self) -> &EntityHelper<EntityStore> {
        &self.helper
    }

    /// Context maker for admin requests
    pub fn admin_contexts(&self) -> &BaseContextMaker {
        &self.admin_contexts
    }

    /// Context maker for API requests; requires an API token
    pub fn api_contexts(&self) -> &TokenAuthenticator {
        &self.authenticator
    }

    pub fn expose_errors(&self) -> bool {
        self.expose_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gateway_wires_shared_engine() {
        let gateway = Gateway::in_memory(&GatewayConfig::new()).unwrap();
        let ctx = RequestContext::new();

        gateway.store().set(&ctx, "Plain", "k", &[]).await.unwrap();

        assert!(gateway.gated_store().is_gated());
        assert!(!gateway.store().is_gated());
        assert_eq!(gateway.gated_store().get(&ctx, "Plain", "k").await, Err(StoreError::NotFound));
    }

    #[test]
    fn test_gateway_rejects_invalid_config() {
        let config = GatewayConfig::new().endpoint("no-slash", "x");
        assert!(matches!(Gateway::in_memory(&config), Err(StoreError::Config(_))));
    }
}
