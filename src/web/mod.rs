//! HTTP surface: admin endpoints for token and quota management, and a
//! billed, permission-gated entity API.

use crate::auth::{ContextMaker, InboundRequest, ProjectTokenLister};
use crate::billing::{LimitedEndpointBiller, TokenBiller};
use crate::context::RequestContext;
use crate::core::{Property, StoreError};
use crate::store::PersistentStore;
use crate::Gateway;
use axum::extract::{Form, Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// A failed request. Internal details reach the client only when `expose` is set.
#[derive(Debug)]
pub struct WebError {
    error: StoreError,
    expose: bool,
}

impl WebError {
    /// Failure to build the request context; there is no request span yet.
    fn context(gateway: &Gateway, err: StoreError) -> Self {
        error!(error = %err, "failed to create request context");
        Self {
            error: err,
            expose: gateway.expose_errors(),
        }
    }

    fn handler(gateway: &Gateway, ctx: &RequestContext, err: StoreError) -> Self {
        error!(parent: ctx.span(), error = %err, "request failed");
        Self {
            error: err,
            expose: gateway.expose_errors(),
        }
    }

    pub fn error(&self) -> &StoreError {
        &self.error
    }

    fn status(&self) -> (StatusCode, &'static str) {
        match self.error.root() {
            StoreError::OutOfCredit => (StatusCode::PAYMENT_REQUIRED, "out_of_credit"),
            StoreError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            StoreError::AccessDenied => (StatusCode::FORBIDDEN, "access_denied"),
            StoreError::InvalidRequest(_) | StoreError::InvalidProperty { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_request")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR && !self.expose {
            "Internal Server Error".to_string()
        } else {
            self.error.to_string()
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;

type Params = Vec<(String, String)>;

/// First value of a parameter, empty when absent.
fn param<'a>(params: &'a [(String, String)], name: &str) -> &'a str {
    params
        .iter()
        .find(|(n, _)| n == name)
        .map_or("", |(_, v)| v.as_str())
}

fn with_controller(ctx: RequestContext, controller: &'static str) -> RequestContext {
    let span = tracing::info_span!(parent: ctx.span(), "controller", controller);
    ctx.with_span(span)
}

pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/admin/api/create-token", post(create_token))
        .route("/admin/api/set-limit", post(set_limit))
        .route("/api/entity", get(get_entity).put(put_entity))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

async fn create_token(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    Form(params): Form<Params>,
) -> Result<Json<String>> {
    let request = InboundRequest { params: &params, headers: &headers };
    let ctx = gateway
        .admin_contexts()
        .make_context(&request)
        .map_err(|e| WebError::context(&gateway, e))?;
    let ctx = with_controller(ctx, "AdminApiCreateToken");

    let token = gateway
        .issuer()
        .create_token(&ctx, param(&params, "project"))
        .await
        .map_err(|e| WebError::handler(&gateway, &ctx, e))?;
    Ok(Json(token))
}

async fn set_limit(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    Form(params): Form<Params>,
) -> Result<Json<bool>> {
    let request = InboundRequest { params: &params, headers: &headers };
    let ctx = gateway
        .admin_contexts()
        .make_context(&request)
        .map_err(|e| WebError::context(&gateway, e))?;
    let ctx = with_controller(ctx, "AdminApiSetLimit");

    let limit: i64 = param(&params, "limit").parse().map_err(|e| {
        WebError::handler(&gateway, &ctx, StoreError::InvalidRequest(format!("invalid limit: {}", e)))
    })?;

    gateway
        .biller()
        .set_limit(&ctx, param(&params, "token"), param(&params, "endpoint"), limit)
        .await
        .map_err(|e| WebError::handler(&gateway, &ctx, e))?;
    Ok(Json(true))
}

/// Authenticate the API token and charge the request path against its quota.
async fn api_context(
    gateway: &Gateway,
    uri: &Uri,
    headers: &HeaderMap,
    params: &[(String, String)],
    controller: &'static str,
) -> Result<RequestContext> {
    let request = InboundRequest { params, headers };
    let authenticator = gateway.api_contexts();
    let ctx = authenticator
        .make_context(&request)
        .map_err(|e| WebError::context(gateway, e))?;
    let ctx = with_controller(ctx, controller);

    let token = authenticator.get_token(&ctx).unwrap_or_default();
    gateway
        .biller()
        .bill(&ctx, token, uri.path())
        .await
        .map_err(|e| WebError::handler(gateway, &ctx, e))?;
    Ok(ctx)
}

fn entity_ref<'a>(
    gateway: &Gateway,
    ctx: &RequestContext,
    params: &'a [(String, String)],
) -> Result<(&'a str, &'a str)> {
    let (kind, key) = (param(params, "kind"), param(params, "key"));
    if kind.is_empty() || key.is_empty() {
        let err = StoreError::InvalidRequest("kind and key are required".into());
        return Err(WebError::handler(gateway, ctx, err));
    }
    Ok((kind, key))
}

async fn get_entity(
    State(gateway): State<Arc<Gateway>>,
    uri: Uri,
    headers: HeaderMap,
    Query(params): Query<Params>,
) -> Result<Json<Vec<Property>>> {
    let ctx = api_context(&gateway, &uri, &headers, &params, "ApiGetEntity").await?;
    let (kind, key) = entity_ref(&gateway, &ctx, &params)?;

    let properties = gateway
        .gated_store()
        .get(&ctx, kind, key)
        .await
        .map_err(|e| WebError::handler(&gateway, &ctx, e))?;
    Ok(Json(properties))
}

async fn put_entity(
    State(gateway): State<Arc<Gateway>>,
    uri: Uri,
    headers: HeaderMap,
    Query(params): Query<Params>,
    Json(properties): Json<Vec<Property>>,
) -> Result<Json<bool>> {
    let ctx = api_context(&gateway, &uri, &headers, &params, "ApiPutEntity").await?;
    let (kind, key) = entity_ref(&gateway, &ctx, &params)?;

    gateway
        .gated_store()
        .set(&ctx, kind, key, &properties)
        .await
        .map_err(|e| WebError::handler(&gateway, &ctx, e))?;
    Ok(Json(true))
}
