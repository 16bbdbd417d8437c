use super::identity::{ContextMaker, InboundRequest};
use crate::context::RequestContext;
use crate::core::{Result, StoreError};
use std::sync::Arc;
use tracing::error;

/// Request parameter carrying the API bearer token.
pub const API_TOKEN_PARAM: &str = "apitoken";

/// Context maker for API requests: requires exactly one API token parameter
/// and records it on the context produced by the wrapped maker.
#[derive(Clone, Default)]
pub struct TokenAuthenticator {
    wrapped: Option<Arc<dyn ContextMaker>>,
}

impl TokenAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrapping(wrapped: Arc<dyn ContextMaker>) -> Self {
        Self { wrapped: Some(wrapped) }
    }

    /// Token presented with the request, if any.
    pub fn get_token<'a>(&self, ctx: &'a RequestContext) -> Option<&'a str> {
        ctx.token().filter(|t| !t.is_empty())
    }
}

impl ContextMaker for TokenAuthenticator {
    fn make_context(&self, request: &InboundRequest<'_>) -> Result<RequestContext> {
        let ctx = match &self.wrapped {
            Some(wrapped) => wrapped.make_context(request)?,
            None => RequestContext::new(),
        };

        let tokens: Vec<&str> = request
            .params
            .iter()
            .filter(|(name, _)| name == API_TOKEN_PARAM)
            .map(|(_, value)| value.as_str())
            .collect();

        let [token] = tokens.as_slice() else {
            error!(parent: ctx.span(), count = tokens.len(), "expected exactly one api token for an API request");
            return Err(StoreError::InvalidRequest(
                "expected exactly one api token for an API request".into(),
            ));
        };

        Ok(ctx.with_token(*token))
    }
}
