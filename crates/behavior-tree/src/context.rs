//! Cancellation scope handed to a [`crate::Ticker`].
//!
//! A [`Context`] completes when it is cancelled explicitly, when its deadline
//! passes, or when any ancestor scope completes. Its [`ContextError`] records
//! which of those happened first.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a [`Context`] completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cloneable cancellation scope with an optional deadline.
///
/// Clones share the same scope; use [`Context::with_cancel`],
/// [`Context::with_timeout`] or [`Context::with_deadline`] to derive a child
/// scope that can be cancelled independently of its parent.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    token: CancellationToken,
    /// Earliest deadline along the scope chain.
    deadline: Option<Instant>,
    cancelled_at: OnceLock<Instant>,
    parent: Option<Context>,
}

impl Context {
    /// Root scope without deadline, completed only by [`Context::cancel`].
    pub fn background() -> Self {
        Self::from_parts(CancellationToken::new(), None, None)
    }

    /// Child scope that is cancelled with this one or through [`Context::cancel`].
    pub fn with_cancel(&self) -> Self {
        Self::from_parts(
            self.inner.token.child_token(),
            self.deadline(),
            Some(self.clone()),
        )
    }

    /// Child scope that expires `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Child scope that expires at `deadline`, or earlier if this one does.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline() {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        Self::from_parts(
            self.inner.token.child_token(),
            Some(deadline),
            Some(self.clone()),
        )
    }

    fn from_parts(
        token: CancellationToken,
        deadline: Option<Instant>,
        parent: Option<Context>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                token,
                deadline,
                cancelled_at: OnceLock::new(),
                parent,
            }),
        }
    }

    /// Cancels this scope and every scope derived from it. Idempotent.
    pub fn cancel(&self) {
        let _ = self.inner.cancelled_at.set(Instant::now());
        self.inner.token.cancel();
    }

    /// Deadline of this scope, inherited from ancestors when earlier.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Token cancelled when this scope is cancelled (not on deadline expiry).
    ///
    /// The token is a child of the scope's own token: cancelling it does not
    /// cancel the scope. Use [`Context::cancel`] for that.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.child_token()
    }

    /// Returns `true` once the scope is cancelled or past its deadline.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Reason the scope completed, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        self.completion(Instant::now()).map(|(_, err)| err)
    }

    /// Earliest completion along the scope chain as of `now`.
    fn completion(&self, now: Instant) -> Option<(Instant, ContextError)> {
        let cancelled = self
            .inner
            .cancelled_at
            .get()
            .map(|at| (*at, ContextError::Canceled));
        let expired = self
            .inner
            .deadline
            .filter(|deadline| *deadline <= now)
            .map(|deadline| (deadline, ContextError::DeadlineExceeded));
        let inherited = self
            .inner
            .parent
            .as_ref()
            .and_then(|parent| parent.completion(now));

        [cancelled, expired, inherited]
            .into_iter()
            .flatten()
            .min_by_key(|(at, _)| *at)
    }

    /// Resolves once the scope is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.inner.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.inner.token.cancelled().await,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_never_done() {
        let ctx = Context::background();
        assert!(!ctx.is_done());
        assert_eq!(ctx.err(), None);
        assert_eq!(ctx.deadline(), None);
    }

    #[test]
    fn cancel_propagates_to_children_only() {
        let parent = Context::background().with_cancel();
        let child = parent.with_cancel();
        let sibling = Context::background().with_cancel();

        parent.cancel();
        parent.cancel();

        assert_eq!(parent.err(), Some(ContextError::Canceled));
        assert_eq!(child.err(), Some(ContextError::Canceled));
        assert!(child.token().is_cancelled());
        assert_eq!(sibling.err(), None);
    }

    #[test]
    fn cancelling_a_handed_out_token_leaves_the_scope_live() {
        let ctx = Context::background().with_cancel();
        let token = ctx.token();

        token.cancel();

        assert!(!ctx.is_done());
        assert_eq!(ctx.err(), None);
        assert!(!ctx.token().is_cancelled());

        ctx.cancel();
        assert!(ctx.token().is_cancelled());
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn done_ignores_handed_out_token_cancellation() {
        let ctx = Context::background().with_timeout(Duration::from_millis(5));
        ctx.token().cancel();

        ctx.done().await;
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[test]
    fn cancelling_a_child_leaves_the_parent_live() {
        let parent = Context::background();
        let child = parent.with_cancel();

        child.cancel();

        assert!(child.is_done());
        assert!(!parent.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires_with_deadline_exceeded() {
        let ctx = Context::background().with_timeout(Duration::from_millis(5));
        assert_eq!(ctx.err(), None);

        let started = Instant::now();
        ctx.done().await;

        assert!(started.elapsed() >= Duration::from_millis(5));
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
        assert!(!ctx.token().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn child_inherits_earlier_parent_deadline() {
        let parent = Context::background().with_timeout(Duration::from_millis(5));
        let child = parent.with_timeout(Duration::from_secs(60));

        assert_eq!(child.deadline(), parent.deadline());
        child.done().await;
        assert_eq!(child.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn first_cause_wins() {
        let ctx = Context::background().with_timeout(Duration::from_millis(5));
        ctx.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(ctx.err(), Some(ContextError::Canceled));

        let ctx = Context::background().with_timeout(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(10)).await;
        ctx.cancel();
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn done_resolves_on_cancel() {
        let ctx = Context::background().with_cancel();
        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.done().await })
        };

        ctx.cancel();
        waiter.await.unwrap();
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }
}
