//! Caller cancellation and deadlines.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AuthzError, AuthzResult};

/// Cancellation and deadline of the call being authorized.
///
/// Every evaluator invocation is raced against both; whichever fires first
/// surfaces as [`AuthzError::Cancelled`] or [`AuthzError::DeadlineExceeded`].
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Use `token` to observe cancellation.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Expire `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Expire at `deadline`. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    /// The cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail if the context is already cancelled or expired.
    pub fn check(&self) -> AuthzResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AuthzError::Cancelled);
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(AuthzError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the context ends first.
    pub async fn run<F: Future>(&self, fut: F) -> AuthzResult<F::Output> {
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(AuthzError::Cancelled),
            () = expired => Err(AuthzError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
