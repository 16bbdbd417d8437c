use super::{PROJECT_AUTH_KIND, Principal, escape_segment, grant_key};
use crate::context::RequestContext;
use crate::core::{Result, StoreError};
use crate::store::PersistentStore;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::info;

/// Raw entropy per token; encodes to 44 URL-safe base64 characters.
pub const TOKEN_BYTES: usize = 33;

/// Admin operation: mint a bearer token with access to a project.
#[async_trait]
pub trait ProjectTokenLister: Send + Sync {
    async fn create_token(&self, ctx: &RequestContext, project: &str) -> Result<String>;
}

/// Issues opaque tokens and records them as `ProjectAuth` grants.
pub struct TokenIssuer<S> {
    store: S,
}

impl<S: PersistentStore> TokenIssuer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Grant `user` access to `project`.
    pub async fn grant_user(&self, ctx: &RequestContext, project: &str, user: &str) -> Result<()> {
        let key = grant_key(&escape_segment(project), Principal::User, user);
        self.store.set(ctx, PROJECT_AUTH_KIND, &key, &[]).await?;
        info!(parent: ctx.span(), project, user, "granted user access to project");
        Ok(())
    }

    fn generate() -> Result<String> {
        let mut raw = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut raw)
            .map_err(|e| StoreError::Transport(format!("failed to generate token: {}", e)))?;
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }
}

#[async_trait]
impl<S: PersistentStore> ProjectTokenLister for TokenIssuer<S> {
    async fn create_token(&self, ctx: &RequestContext, project: &str) -> Result<String> {
        let token = Self::generate()?;
        let key = grant_key(&escape_segment(project), Principal::Token, &token);
        self.store.set(ctx, PROJECT_AUTH_KIND, &key, &[]).await?;

        // The token itself is never logged.
        info!(parent: ctx.span(), project, "created token for project");
        Ok(token)
    }
}
