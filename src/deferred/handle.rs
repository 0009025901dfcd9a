//! Async handles: the submission primitive behind `DeferredValue::Async`.
//!
//! An [`AsyncHandle`] is the reading side of an externally running computation.
//! It can be polled ([`is_complete`](AsyncHandle::is_complete)), waited on with
//! or without a deadline, awaited as a [`Future`], and observed through
//! completion listeners. The writing side is a [`Completer`], which is consumed
//! by completing it. Dropping a completer without completing it settles the
//! handle with [`DeferredError::Abandoned`], so waiters never hang on a producer
//! that went away.
//!
//! # Examples
//!
//! ```rust
//! use slackwater::deferred::AsyncHandle;
//! use std::thread;
//!
//! let (completer, handle) = AsyncHandle::channel();
//! thread::spawn(move || completer.succeed(6 * 7));
//!
//! assert_eq!(handle.wait(), Ok(42));
//! assert!(handle.is_complete());
//! ```

use std::fmt;
use std::future::{Future, IntoFuture};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::oneshot;
use futures::FutureExt;

use super::latch::Latch;
use crate::error::{DeferredError, Outcome};

/// Reading side of an asynchronous computation.
///
/// Handles are cheap to clone; all clones observe the same completion.
pub struct AsyncHandle<T> {
    latch: Arc<Latch<T>>,
}

/// Writing side of an [`AsyncHandle`].
pub struct Completer<T: Clone> {
    latch: Option<Arc<Latch<T>>>,
}

impl<T> Clone for AsyncHandle<T> {
    fn clone(&self) -> Self {
        Self {
            latch: Arc::clone(&self.latch),
        }
    }
}

impl<T: Clone + Send + 'static> AsyncHandle<T> {
    /// Create a connected completer/handle pair.
    pub fn channel() -> (Completer<T>, AsyncHandle<T>) {
        let latch = Arc::new(Latch::new());
        (
            Completer {
                latch: Some(Arc::clone(&latch)),
            },
            AsyncHandle { latch },
        )
    }

    /// A handle that is already complete with `outcome`.
    pub fn completed(outcome: Outcome<T>) -> Self {
        Self {
            latch: Arc::new(Latch::settled(outcome)),
        }
    }

    /// Whether the computation has finished (successfully or not).
    pub fn is_complete(&self) -> bool {
        self.latch.is_settled()
    }

    /// The outcome, if the computation has finished. Never blocks.
    pub fn peek(&self) -> Option<Outcome<T>> {
        self.latch.peek()
    }

    /// Register a listener run once with the outcome.
    ///
    /// Runs on the completing thread, or immediately on the calling thread if
    /// the handle is already complete.
    pub fn on_complete<F>(&self, listener: F)
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        self.latch.listen(Box::new(listener));
    }

    /// Block until the computation finishes.
    pub fn wait(&self) -> Outcome<T> {
        self.latch.wait()
    }

    /// Block for at most `timeout`.
    ///
    /// Returns [`DeferredError::TimedOut`] if the computation is still running
    /// when the timeout elapses. The computation itself keeps running.
    ///
    /// ```rust
    /// use slackwater::deferred::AsyncHandle;
    /// use slackwater::DeferredError;
    /// use std::time::Duration;
    ///
    /// let (_completer, handle) = AsyncHandle::<i32>::channel();
    /// let outcome = handle.wait_timeout(Duration::from_millis(5));
    /// assert_eq!(outcome, Err(DeferredError::TimedOut(Duration::from_millis(5))));
    /// ```
    pub fn wait_timeout(&self, timeout: Duration) -> Outcome<T> {
        self.latch.wait_timeout(timeout)
    }

    /// Cancellation is not supported; this always fails.
    ///
    /// A computation already handed to a worker cannot be interrupted, so this
    /// reports [`DeferredError::Unsupported`] instead of pretending to succeed.
    pub fn cancel(&self) -> Result<(), DeferredError> {
        Err(DeferredError::Unsupported("cancel"))
    }

    /// Derive a new handle completed by applying `f` to this handle's outcome.
    ///
    /// `f` runs on the thread that completes this handle. A panic in `f`
    /// completes the derived handle with [`DeferredError::Panicked`].
    pub fn then<U, F>(&self, f: F) -> AsyncHandle<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Outcome<T>) -> Outcome<U> + Send + 'static,
    {
        let (completer, derived) = AsyncHandle::channel();
        self.on_complete(move |outcome| {
            let outcome = outcome.clone();
            let next = panic::catch_unwind(AssertUnwindSafe(move || f(outcome)))
                .unwrap_or_else(|payload| Err(DeferredError::from_panic(payload)));
            completer.complete(next);
        });
        derived
    }

    /// Run `future` on the current tokio runtime and expose it as a handle.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    #[cfg(feature = "async")]
    pub fn spawn_future<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (completer, handle) = Self::channel();
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .map_err(DeferredError::from_panic);
            completer.complete(outcome);
        });
        handle
    }
}

impl<T: Clone + Send + 'static> IntoFuture for AsyncHandle<T> {
    type Output = Outcome<T>;
    type IntoFuture = DeferredFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        let (tx, rx) = oneshot::channel();
        self.on_complete(move |outcome| {
            // The receiver may already be gone; nothing is waiting then.
            let _ = tx.send(outcome.clone());
        });
        DeferredFuture::waiting(rx)
    }
}

impl<T> fmt::Debug for AsyncHandle<T>
where
    T: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncHandle")
            .field("complete", &self.latch.is_settled())
            .finish()
    }
}

impl<T: Clone> Completer<T> {
    /// Complete the handle with `outcome`, waking waiters and running listeners.
    pub fn complete(mut self, outcome: Outcome<T>) {
        if let Some(latch) = self.latch.take() {
            latch.settle(outcome);
        }
    }

    /// Complete the handle with a value.
    pub fn succeed(self, value: T) {
        self.complete(Ok(value));
    }

    /// Complete the handle with a failure.
    pub fn fail(self, error: DeferredError) {
        self.complete(Err(error));
    }
}

impl<T: Clone> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(latch) = self.latch.take() {
            latch.settle(Err(DeferredError::Abandoned));
        }
    }
}

impl<T: Clone> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("pending", &self.latch.is_some())
            .finish()
    }
}

/// Future resolving to the outcome of a deferred value or async handle.
///
/// Created by `IntoFuture` on [`AsyncHandle`] and
/// [`DeferredValue`](crate::DeferredValue).
///
/// ```rust
/// use slackwater::DeferredValue;
///
/// # tokio_test::block_on(async {
/// let answer = DeferredValue::lazy(|| 6 * 7).map(|n| n + 0);
/// assert_eq!(answer.await, Ok(42));
/// # });
/// ```
pub struct DeferredFuture<T> {
    state: FutureState<T>,
}

enum FutureState<T> {
    Ready(Option<Outcome<T>>),
    Waiting(oneshot::Receiver<Outcome<T>>),
}

impl<T> DeferredFuture<T> {
    pub(crate) fn ready(outcome: Outcome<T>) -> Self {
        Self {
            state: FutureState::Ready(Some(outcome)),
        }
    }

    pub(crate) fn waiting(rx: oneshot::Receiver<Outcome<T>>) -> Self {
        Self {
            state: FutureState::Waiting(rx),
        }
    }
}

// No structural pinning: the receiver is Unpin and the ready slot is moved out.
impl<T> Unpin for DeferredFuture<T> {}

impl<T> Future for DeferredFuture<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            FutureState::Ready(slot) => {
                Poll::Ready(slot.take().unwrap_or(Err(DeferredError::Abandoned)))
            }
            FutureState::Waiting(rx) => rx
                .poll_unpin(cx)
                .map(|received| received.unwrap_or(Err(DeferredError::Abandoned))),
        }
    }
}

impl<T> fmt::Debug for DeferredFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            FutureState::Ready(_) => "ready",
            FutureState::Waiting(_) => "waiting",
        };
        f.debug_struct("DeferredFuture").field("state", &state).finish()
    }
}
