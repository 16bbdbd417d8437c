use super::{
    PROJECT_AUTH_KIND, PermissionChecker, Principal, TokenAuthenticator, UserService, grant_key,
    project_segment,
};
use crate::context::RequestContext;
use crate::core::Result;
use crate::store::PersistentStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Grants access to `project/...` keys when the caller's user id or API token
/// has an ACL grant on that project.
///
/// `store` must be ungated: grant lookups are never themselves permission checked.
pub struct ProjectPermissionChecker<S> {
    store: S,
    user_service: Option<Arc<dyn UserService>>,
    token_authenticator: Option<Arc<TokenAuthenticator>>,
}

impl<S: PersistentStore> ProjectPermissionChecker<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            user_service: None,
            token_authenticator: None,
        }
    }

    pub fn with_user_service(mut self, user_service: Arc<dyn UserService>) -> Self {
        self.user_service = Some(user_service);
        self
    }

    pub fn with_token_authenticator(mut self, authenticator: Arc<TokenAuthenticator>) -> Self {
        self.token_authenticator = Some(authenticator);
        self
    }

    async fn check(&self, ctx: &RequestContext, key: &str) -> Result<bool> {
        let escaped_project = project_segment(key);

        if let Some(user) = self
            .user_service
            .as_ref()
            .and_then(|users| users.context_user(ctx))
            .filter(|u| !u.is_empty())
        {
            let grant = grant_key(escaped_project, Principal::User, &user);
            if self.store.exists(ctx, PROJECT_AUTH_KIND, &grant).await? {
                return Ok(true);
            }
        }

        // Checked even when a user was present but had no grant.
        if let Some(token) = self
            .token_authenticator
            .as_ref()
            .and_then(|auth| auth.get_token(ctx))
        {
            let grant = grant_key(escaped_project, Principal::Token, token);
            if self.store.exists(ctx, PROJECT_AUTH_KIND, &grant).await? {
                return Ok(true);
            }
        }

        debug!(parent: ctx.span(), project = escaped_project, "no grant for caller");
        Ok(false)
    }
}

#[async_trait]
impl<S: PersistentStore> PermissionChecker for ProjectPermissionChecker<S> {
    async fn check_read(&self, ctx: &RequestContext, _kind: &str, key: &str) -> Result<bool> {
        self.check(ctx, key).await
    }

    async fn check_write(&self, ctx: &RequestContext, _kind: &str, key: &str) -> Result<bool> {
        self.check(ctx, key).await
    }
}
