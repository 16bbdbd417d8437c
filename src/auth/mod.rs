//! Project-scoped authorization backed by ACL grant entities.
//!
//! A grant is an entity of kind [`PROJECT_AUTH_KIND`] keyed
//! `escaped-project/user|token/escaped-principal`. Its existence alone grants
//! read and write access to every entity keyed `project/...`.

pub mod identity;
pub mod issuer;
pub mod permission;
pub mod token;

use crate::context::RequestContext;
use crate::core::Result;
use async_trait::async_trait;
use std::fmt;

pub use identity::{BaseContextMaker, ContextMaker, ContextUserService, InboundRequest, UserService};
pub use issuer::{ProjectTokenLister, TOKEN_BYTES, TokenIssuer};
pub use permission::ProjectPermissionChecker;
pub use token::{API_TOKEN_PARAM, TokenAuthenticator};

pub const PROJECT_AUTH_KIND: &str = "ProjectAuth";

/// Authorization decision for a `(kind, key)` pair.
///
/// `Ok(false)` is an ordinary denial; `Err` means the decision could not be made.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn check_read(&self, ctx: &RequestContext, kind: &str, key: &str) -> Result<bool>;
    async fn check_write(&self, ctx: &RequestContext, kind: &str, key: &str) -> Result<bool>;
}

/// Who a grant is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    User,
    Token,
}

impl Principal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Principal::User => "user",
            Principal::Token => "token",
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percent-encode one `/`-delimited key segment.
pub fn escape_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Everything before the first `/`; gated keys start with the escaped project id.
pub fn project_segment(key: &str) -> &str {
    key.split_once('/').map_or(key, |(project, _)| project)
}

/// Grant key for a principal. `escaped_project` must already be escaped.
pub fn grant_key(escaped_project: &str, principal: Principal, id: &str) -> String {
    format!("{}/{}/{}", escaped_project, principal, escape_segment(id))
}
