//! Request-scoped state threaded explicitly through every store call.

use crate::core::{Result, StoreError};
use crate::transaction::TransactionId;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Span;
use uuid::Uuid;

/// Everything a single inbound request carries: who is calling, which
/// transaction (if any) store calls belong to, when to give up, and where to log.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    user: Option<String>,
    token: Option<String>,
    transaction: Option<TransactionId>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    span: Span,
}

impl RequestContext {
    pub fn new() -> Self {
        let request_id = Uuid::new_v4();
        Self {
            request_id,
            user: None,
            token: None,
            transaction: None,
            cancel: CancellationToken::new(),
            deadline: None,
            span: tracing::info_span!("request", %request_id),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Copy of this context whose store calls run inside `txn`.
    pub fn with_transaction(&self, txn: TransactionId) -> Self {
        let mut ctx = self.clone();
        ctx.transaction = Some(txn);
        ctx
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Authenticated principal, if an identity was attached.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Presented API token, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn transaction(&self) -> Option<TransactionId> {
        self.transaction
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn ensure_live(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(StoreError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` unless the request is cancelled or its deadline passes first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.ensure_live()?;

        let guarded = async {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(StoreError::Cancelled),
                res = fut => res,
            }
        };

        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, guarded)
                .await
                .unwrap_or(Err(StoreError::DeadlineExceeded)),
            None => guarded.await,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_transaction_leaves_original_untouched() {
        let ctx = RequestContext::new().with_token("tok");
        let txn = TransactionId::new();
        let inner = ctx.with_transaction(txn);

        assert_eq!(inner.transaction(), Some(txn));
        assert_eq!(inner.token(), Some("tok"));
        assert_eq!(inner.request_id(), ctx.request_id());
        assert_eq!(ctx.transaction(), None);
    }

    #[tokio::test]
    async fn test_run_passes_through_result() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.run(async { Ok(5) }).await, Ok(5));
        assert_eq!(
            ctx.run(async { Err::<(), _>(StoreError::NotFound) }).await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_cancelled_context_refuses_work() {
        let cancel = CancellationToken::new();
        let ctx = RequestContext::new().with_cancellation(cancel.clone());
        cancel.cancel();

        assert_eq!(ctx.ensure_live(), Err(StoreError::Cancelled));
        assert_eq!(ctx.run(async { Ok(1) }).await, Err(StoreError::Cancelled));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_slow_work() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(10));
        let res = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert_eq!(res, Err(StoreError::DeadlineExceeded));
    }
}
