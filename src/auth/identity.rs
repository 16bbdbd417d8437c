use crate::context::RequestContext;
use crate::core::Result;
use http::{HeaderMap, HeaderName};
use std::time::Duration;

/// The parts of an inbound request that context creation looks at.
#[derive(Debug, Clone, Copy)]
pub struct InboundRequest<'a> {
    /// Decoded query/form parameters, repeated names preserved.
    pub params: &'a [(String, String)],
    pub headers: &'a HeaderMap,
}

/// Builds the request-scoped context for an inbound request.
pub trait ContextMaker: Send + Sync {
    fn make_context(&self, request: &InboundRequest<'_>) -> Result<RequestContext>;
}

/// Resolves the authenticated principal for a request.
pub trait UserService: Send + Sync {
    /// Principal id, or `None` when the caller is anonymous.
    fn context_user(&self, ctx: &RequestContext) -> Option<String>;
}

/// Reads the user recorded on the context by the [`ContextMaker`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextUserService;

impl UserService for ContextUserService {
    fn context_user(&self, ctx: &RequestContext) -> Option<String> {
        ctx.user().filter(|u| !u.is_empty()).map(str::to_string)
    }
}

/// Root context maker: fresh request id, optional identity from a trusted
/// header set by the fronting proxy, optional per-request timeout.
#[derive(Debug, Clone, Default)]
pub struct BaseContextMaker {
    user_header: Option<HeaderName>,
    timeout: Option<Duration>,
}

impl BaseContextMaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_header(mut self, header: HeaderName) -> Self {
        self.user_header = Some(header);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl ContextMaker for BaseContextMaker {
    fn make_context(&self, request: &InboundRequest<'_>) -> Result<RequestContext> {
        let mut ctx = RequestContext::new();

        let user = self
            .user_header
            .as_ref()
            .and_then(|h| request.headers.get(h))
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|u| !u.is_empty());
        if let Some(user) = user {
            ctx = ctx.with_user(user);
        }

        if let Some(timeout) = self.timeout {
            ctx = ctx.with_timeout(timeout);
        }

        Ok(ctx)
    }
}
