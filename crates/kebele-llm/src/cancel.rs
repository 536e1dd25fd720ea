//! Call context carrying cancellation and deadline across provider hops.
//!
//! Every provider call (embedding, completion, retrieval, persistence) is
//! wrapped with [`CallContext::run`], which races the call against the
//! caller's cancellation token and the tighter of the caller's deadline and
//! the component's own per-call bound.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;

/// Request-scoped cancellation and deadline.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Create a context with no deadline and a fresh cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context driven by an existing cancellation token.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            deadline: None,
        }
    }

    /// Tighten the deadline to at most `timeout` from now.
    ///
    /// An existing earlier deadline is kept.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(candidate),
            None => candidate,
        });
        self
    }

    /// Derive a child context: cancelling the parent cancels the child,
    /// but not the other way around.
    pub fn child(&self) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
            deadline: self.deadline,
        }
    }

    /// The underlying cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Check if the context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The absolute deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if one was set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// The tighter of a component's own bound and the caller's remaining time.
    pub fn effective_timeout(&self, bound: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => remaining.min(bound),
            None => bound,
        }
    }

    /// Run `fut` until it completes, the context is cancelled, or the
    /// effective timeout elapses.
    ///
    /// Generic over the error type so collaborators outside this crate
    /// (retrieval, persistence) share the same cancellation semantics.
    pub async fn run<F, T, E>(&self, bound: Duration, fut: F) -> std::result::Result<T, E>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: From<LlmError>,
    {
        if self.is_cancelled() {
            return Err(LlmError::Cancelled.into());
        }

        let timeout = self.effective_timeout(bound);
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(LlmError::Cancelled.into()),
            outcome = tokio::time::timeout(timeout, fut) => match outcome {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(timeout).into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;

    #[tokio::test(start_paused = true)]
    async fn test_run_completes() {
        let ctx = CallContext::new();
        let value = ctx
            .run(Duration::from_secs(1), async { Ok::<_, LlmError>(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_component_bound_times_out() {
        let ctx = CallContext::new();
        let err = ctx
            .run(Duration::from_secs(15), async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, LlmError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Timeout(d) if d == Duration::from_secs(15)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shorter_caller_deadline_wins() {
        let ctx = CallContext::new().with_timeout(Duration::from_secs(1));
        let err = ctx
            .run(Duration::from_secs(15), async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, LlmError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Timeout(d) if d <= Duration::from_secs(1)));
    }

    #[test]
    fn test_with_timeout_keeps_earlier_deadline() {
        let ctx = CallContext::new().with_timeout(Duration::from_secs(1));
        let first = ctx.deadline().unwrap();
        let ctx = ctx.with_timeout(Duration::from_secs(30));
        assert_eq!(ctx.deadline().unwrap(), first);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_in_flight_call() {
        let ctx = CallContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = ctx
            .run(Duration::from_secs(30), std::future::pending::<Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Cancelled));
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_call() {
        let ctx = CallContext::new();
        ctx.cancel();

        let called = std::sync::atomic::AtomicBool::new(false);
        let err = ctx
            .run(Duration::from_secs(1), async {
                called.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, LlmError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Cancelled));
        assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_child_follows_parent() {
        let parent = CallContext::new();
        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());

        let parent = CallContext::new();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_cancelled());
    }
}
