//! Per-call cancellation and deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::TransportError;

/// Cancellation scope for a single call.
///
/// Cloning is cheap and clones share the same cancellation token, so a
/// context handed to [`PostalClient::send`](crate::PostalClient::send) can be
/// cancelled from another task.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Creates a context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Sets a deadline relative to now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns the cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels the context and every clone of it.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Returns true once the context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Runs `fut` until it completes, the context is cancelled, or the
    /// deadline passes, whichever comes first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(TransportError::Cancelled),
            () = deadline => Err(TransportError::DeadlineExceeded),
            result = fut => result,
        }
    }

    /// Sleeps for `duration` unless the context ends first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), TransportError> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = RequestContext::new();
        let result = ctx.run(async { Ok::<_, TransportError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_run_already_cancelled() {
        let ctx = RequestContext::new();
        ctx.cancel();

        let result = ctx.run(async { Ok::<_, TransportError>(7) }).await;
        assert!(matches!(result, Err(TransportError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_from_clone() {
        let ctx = RequestContext::new();
        let handle = ctx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let result = ctx.sleep(Duration::from_secs(10)).await;
        assert!(matches!(result, Err(TransportError::Cancelled)));
    }

    #[tokio::test]
    async fn test_deadline() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(20));
        let result = ctx.sleep(Duration::from_secs(10)).await;
        assert!(matches!(result, Err(TransportError::DeadlineExceeded)));
    }
}
