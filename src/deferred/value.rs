//! The `DeferredValue` container.

use std::error::Error as StdError;
use std::fmt;
use std::future::IntoFuture;
use std::mem;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use super::handle::{AsyncHandle, Completer, DeferredFuture};
use super::latch::Latch;
use super::pool::WorkerPool;
use super::{lock, run_guarded};
use crate::error::{DeferredError, Outcome};

type Thunk<T> = Box<dyn FnOnce() -> Outcome<T> + Send + 'static>;

/// Which representation currently backs a [`DeferredValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// The outcome is already available.
    Resolved,
    /// A thunk will be run on demand.
    Deferred,
    /// An external asynchronous computation will produce the outcome.
    Async,
}

enum State<T> {
    Resolved(Outcome<T>),
    Deferred(Thunk<T>),
    /// The thunk has been taken by a forcing thread; the outcome arrives
    /// through the effects latch.
    Forcing,
    Async(AsyncHandle<T>),
}

impl<T> State<T> {
    fn variant(&self) -> Variant {
        match self {
            State::Resolved(_) => Variant::Resolved,
            State::Deferred(_) | State::Forcing => Variant::Deferred,
            State::Async(_) => Variant::Async,
        }
    }
}

struct Cell<T> {
    state: Mutex<State<T>>,
    effects: Arc<Latch<T>>,
}

impl<T: Clone + Send + 'static> Cell<T> {
    /// Record an outcome observed through an async handle.
    fn settle(&self, outcome: &Outcome<T>) {
        {
            let mut state = lock(&self.state);
            if !matches!(&*state, State::Resolved(_)) {
                *state = State::Resolved(outcome.clone());
            }
        }
        self.effects.settle(outcome.clone());
    }
}

/// What an operation sees when it inspects the current state without forcing.
enum Snapshot<T> {
    Ready(Outcome<T>),
    Lazy,
    Pending(AsyncHandle<T>),
}

/// A single value that may be resolved, computed on demand, or computed
/// asynchronously.
///
/// `DeferredValue` is a cheap cloneable handle: clones share one underlying cell,
/// so a thunk runs at most once no matter how many clones force it, and effect
/// callbacks registered through any clone fire exactly once.
///
/// Composition (`map`, `apply`, `bind`, `join`) never blocks and never swallows
/// a failure: bottoms surface only when a terminal operation (`try_get`,
/// `to_result`, `to_option`, `get`) is called.
///
/// # Example
///
/// ```rust
/// use slackwater::DeferredValue;
///
/// let price = DeferredValue::lazy(|| 40);
/// let total = price.map(|p| p + 2);
/// assert_eq!(total.to_option(), Some(42));
/// ```
pub struct DeferredValue<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Clone for DeferredValue<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Clone + Send + 'static> DeferredValue<T> {
    fn with_state(state: State<T>, effects: Latch<T>) -> Self {
        Self {
            cell: Arc::new(Cell {
                state: Mutex::new(state),
                effects: Arc::new(effects),
            }),
        }
    }

    // ========== Construction ==========

    /// A value that is already available.
    ///
    /// ```rust
    /// use slackwater::{DeferredValue, Variant};
    ///
    /// let v = DeferredValue::resolved("ready");
    /// assert_eq!(v.variant(), Variant::Resolved);
    /// assert_eq!(v.to_option(), Some("ready"));
    /// ```
    pub fn resolved(value: T) -> Self {
        Self::from_outcome(Ok(value))
    }

    /// Alias for [`resolved`](Self::resolved).
    pub fn from_value(value: T) -> Self {
        Self::resolved(value)
    }

    /// Fail-fast construction from an optional input.
    ///
    /// ```rust
    /// use slackwater::{DeferredError, DeferredValue};
    ///
    /// assert!(DeferredValue::from_option(Some(1)).is_ok());
    /// assert_eq!(
    ///     DeferredValue::<i32>::from_option(None).unwrap_err(),
    ///     DeferredError::MissingInput("value")
    /// );
    /// ```
    pub fn from_option(value: Option<T>) -> Result<Self, DeferredError> {
        value
            .map(Self::resolved)
            .ok_or(DeferredError::MissingInput("value"))
    }

    /// An already-resolved bottom.
    pub fn failed(error: DeferredError) -> Self {
        Self::from_outcome(Err(error))
    }

    /// An already-resolved outcome.
    pub fn from_outcome(outcome: Outcome<T>) -> Self {
        Self::with_state(
            State::Resolved(outcome.clone()),
            Latch::settled(outcome),
        )
    }

    /// A value computed on demand by a thunk that reports its own outcome.
    ///
    /// The thunk runs at most once. Panics are caught at the forcing point and
    /// surface as [`DeferredError::Panicked`].
    pub fn from_thunk<F>(thunk: F) -> Self
    where
        F: FnOnce() -> Outcome<T> + Send + 'static,
    {
        Self::with_state(State::Deferred(Box::new(thunk)), Latch::new())
    }

    /// A value computed on demand by an infallible thunk.
    pub fn lazy<F>(thunk: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::from_thunk(move || Ok(thunk()))
    }

    /// A value computed on demand by a fallible thunk.
    ///
    /// ```rust
    /// use slackwater::{DeferredError, DeferredValue};
    ///
    /// let parsed = DeferredValue::try_lazy(|| "12".parse::<i32>());
    /// assert_eq!(parsed.to_result(), Ok(12));
    ///
    /// let broken = DeferredValue::try_lazy(|| "twelve".parse::<i32>());
    /// assert!(matches!(broken.to_result(), Err(DeferredError::Failed(_))));
    /// ```
    pub fn try_lazy<F, E>(thunk: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        Self::from_thunk(move || thunk().map_err(DeferredError::failed))
    }

    /// A value computed on demand by a thunk that may produce nothing.
    pub fn lazy_option<F>(thunk: F) -> Self
    where
        F: FnOnce() -> Option<T> + Send + 'static,
    {
        Self::from_thunk(move || thunk().ok_or(DeferredError::Absent))
    }

    /// A value produced by an external asynchronous computation.
    ///
    /// Completion of `handle` resolves this value and fires its effects, on
    /// whichever thread completes the handle.
    pub fn from_handle(handle: AsyncHandle<T>) -> Self {
        let value = Self::with_state(State::Async(handle.clone()), Latch::new());
        value.attach(&handle);
        value
    }

    /// Start computing `thunk` on the shared worker pool right away.
    pub fn spawn<F>(thunk: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::lazy(thunk).evaluate()
    }

    /// Start computing `thunk` on `pool` right away.
    pub fn spawn_on<F>(pool: &WorkerPool, thunk: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::lazy(thunk).evaluate_on(pool)
    }

    fn attach(&self, handle: &AsyncHandle<T>) {
        let cell = Arc::downgrade(&self.cell);
        let effects = Arc::clone(&self.cell.effects);
        handle.on_complete(move |outcome| match cell.upgrade() {
            Some(cell) => cell.settle(outcome),
            // Every clone is gone; subscribed effects still get their value.
            None => {
                effects.settle(outcome.clone());
            }
        });
    }

    // ========== Inspection ==========

    /// The representation currently backing this value.
    ///
    /// A value whose thunk is running on another thread still reports
    /// [`Variant::Deferred`].
    pub fn variant(&self) -> Variant {
        lock(&self.cell.state).variant()
    }

    /// Whether an outcome is available without blocking.
    pub fn is_resolved(&self) -> bool {
        match &*lock(&self.cell.state) {
            State::Resolved(_) => true,
            State::Deferred(_) | State::Forcing => false,
            State::Async(handle) => handle.is_complete(),
        }
    }

    fn snapshot(&self) -> Snapshot<T> {
        match &*lock(&self.cell.state) {
            State::Resolved(outcome) => return Snapshot::Ready(outcome.clone()),
            State::Deferred(_) => return Snapshot::Lazy,
            State::Async(handle) => return Snapshot::Pending(handle.clone()),
            State::Forcing => {}
        }
        Snapshot::Pending(self.completion())
    }

    /// A handle completed through the effects latch, registered outside the
    /// state lock.
    fn completion(&self) -> AsyncHandle<T> {
        let (completer, handle) = AsyncHandle::channel();
        self.cell
            .effects
            .listen(Box::new(move |outcome| completer.complete(outcome.clone())));
        handle
    }

    // ========== Effects ==========

    /// Subscribe a callback to the value.
    ///
    /// Runs immediately if the value is already resolved, otherwise on the
    /// thread that resolves it. Each callback runs exactly once; if the value
    /// resolves to a bottom the callback is discarded without running.
    ///
    /// ```rust
    /// use slackwater::DeferredValue;
    /// use std::sync::{Arc, Mutex};
    ///
    /// let seen = Arc::new(Mutex::new(Vec::new()));
    /// let value = DeferredValue::lazy(|| 3);
    ///
    /// let sink = Arc::clone(&seen);
    /// value.effect(move |v| sink.lock().unwrap().push(*v));
    /// assert!(seen.lock().unwrap().is_empty());
    ///
    /// value.to_option();
    /// assert_eq!(*seen.lock().unwrap(), vec![3]);
    /// ```
    pub fn effect<F>(&self, callback: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.cell.effects.listen(Box::new(move |outcome| {
            if let Ok(value) = outcome {
                callback(value);
            }
        }));
    }

    /// Subscribe a callback that also observes bottoms.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(Result<&T, &DeferredError>) + Send + 'static,
    {
        self.cell
            .effects
            .listen(Box::new(move |outcome| callback(outcome.as_ref())));
    }

    // ========== Evaluation ==========

    /// Start evaluating a `Deferred` value on the shared worker pool.
    ///
    /// Never blocks. The value transitions to `Async`; callbacks registered
    /// before the call still fire. `Resolved` and `Async` values, and values
    /// whose thunk another thread is already running, are returned unchanged.
    /// If the shared pool is unavailable the value stays `Deferred` and will
    /// be forced on first access.
    ///
    /// ```rust
    /// use slackwater::{DeferredValue, Variant};
    ///
    /// let value = DeferredValue::lazy(|| 1 + 1).evaluate();
    /// assert_eq!(value.variant(), Variant::Async);
    /// assert_eq!(value.to_option(), Some(2));
    /// ```
    pub fn evaluate(&self) -> Self {
        match WorkerPool::shared() {
            Some(pool) => self.evaluate_on(pool),
            None => {
                tracing::warn!("no shared worker pool; value stays deferred");
                self.clone()
            }
        }
    }

    /// Start evaluating a `Deferred` value on `pool`.
    pub fn evaluate_on(&self, pool: &WorkerPool) -> Self {
        let submitted = {
            let mut state = lock(&self.cell.state);
            match mem::replace(&mut *state, State::Resolved(Err(DeferredError::Abandoned))) {
                State::Deferred(thunk) => {
                    let handle = pool.submit(thunk);
                    *state = State::Async(handle.clone());
                    Some(handle)
                }
                other => {
                    *state = other;
                    None
                }
            }
        };

        if let Some(handle) = submitted {
            if pool.settings().verbose() {
                tracing::debug!("deferred value submitted for evaluation");
            }
            self.attach(&handle);
        }
        self.clone()
    }

    fn force(&self, timeout: Option<Duration>) -> Outcome<T> {
        let handle = {
            let mut state = lock(&self.cell.state);
            match mem::replace(&mut *state, State::Forcing) {
                State::Resolved(outcome) => {
                    *state = State::Resolved(outcome.clone());
                    return outcome;
                }
                State::Async(handle) => {
                    *state = State::Async(handle.clone());
                    handle
                }
                State::Forcing => {
                    drop(state);
                    return match timeout {
                        Some(timeout) => self.cell.effects.wait_timeout(timeout),
                        None => self.cell.effects.wait(),
                    };
                }
                State::Deferred(thunk) => {
                    drop(state);
                    // Runs unlocked; other threads see `Forcing` meanwhile.
                    let outcome = run_guarded(thunk);
                    *lock(&self.cell.state) = State::Resolved(outcome.clone());
                    self.cell.effects.settle(outcome.clone());
                    return outcome;
                }
            }
        };

        let outcome = match timeout {
            Some(timeout) => handle.wait_timeout(timeout),
            None => handle.wait(),
        };
        if !matches!(outcome, Err(DeferredError::TimedOut(_))) {
            self.cell.settle(&outcome);
        }
        outcome
    }

    // ========== Terminal accessors ==========

    /// Force the value on the calling thread and return its outcome.
    ///
    /// A `Deferred` value runs its thunk inline; an `Async` value blocks until
    /// its handle completes.
    pub fn try_get(&self) -> Outcome<T> {
        self.force(None)
    }

    /// Force the value, waiting at most `timeout` for an `Async` computation
    /// or for a thunk another thread is running.
    ///
    /// A `Deferred` thunk that this call runs itself runs inline and is not
    /// subject to the timeout.
    pub fn get_timeout(&self, timeout: Duration) -> Outcome<T> {
        self.force(Some(timeout))
    }

    /// Force the value and return it.
    ///
    /// Prefer [`to_result`](Self::to_result) or [`to_option`](Self::to_option).
    ///
    /// # Panics
    ///
    /// Panics with the captured failure if the value is a bottom.
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("DeferredValue::get on a bottom value: {}", err),
        }
    }

    /// Force the value, converting any bottom into `Err`.
    pub fn to_result(&self) -> Outcome<T> {
        self.try_get()
    }

    /// Force the value, converting any bottom into `None`.
    pub fn to_option(&self) -> Option<T> {
        self.try_get().ok()
    }

    /// Cancellation is not supported; this always fails.
    pub fn cancel(&self) -> Result<(), DeferredError> {
        Err(DeferredError::Unsupported("cancel"))
    }

    // ========== Composition ==========

    /// Lift `f` over the value.
    ///
    /// - `Resolved` and `Deferred` values produce a `Deferred` value; `f` runs
    ///   when the result is forced.
    /// - `Async` values produce an `Async` value chained onto the upstream
    ///   computation; `f` runs on the thread that completes it. Nothing blocks.
    pub fn map<U, F>(&self, f: F) -> DeferredValue<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self.snapshot() {
            Snapshot::Ready(outcome) => DeferredValue::from_thunk(move || outcome.map(f)),
            Snapshot::Lazy => {
                let upstream = self.clone();
                DeferredValue::from_thunk(move || upstream.try_get().map(f))
            }
            Snapshot::Pending(handle) => {
                DeferredValue::from_handle(handle.then(move |outcome| outcome.map(f)))
            }
        }
    }

    /// Lift `f` over the value, substituting `fallback` for an upstream bottom.
    ///
    /// A panic inside `f` itself still surfaces as a bottom.
    ///
    /// ```rust
    /// use slackwater::DeferredValue;
    ///
    /// let flaky = DeferredValue::<i32>::lazy_option(|| None);
    /// assert_eq!(flaky.map_or(0, |v| v * 10).to_option(), Some(0));
    /// ```
    pub fn map_or<U, F>(&self, fallback: T, f: F) -> DeferredValue<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self.snapshot() {
            Snapshot::Ready(outcome) => {
                DeferredValue::from_thunk(move || Ok(f(outcome.unwrap_or(fallback))))
            }
            Snapshot::Lazy => {
                let upstream = self.clone();
                DeferredValue::from_thunk(move || Ok(f(upstream.try_get().unwrap_or(fallback))))
            }
            Snapshot::Pending(handle) => DeferredValue::from_handle(
                handle.then(move |outcome| Ok(f(outcome.unwrap_or(fallback)))),
            ),
        }
    }

    /// Apply a deferred function to this value, keeping this value's variant.
    ///
    /// The function side is forced the way this side would be: immediately for
    /// a `Resolved` receiver, when the result is forced for a `Deferred` one,
    /// and on completion for an `Async` one. A `Resolved` receiver whose
    /// function side is still pending (`Async`, or being forced elsewhere)
    /// yields an `Async` value chained on the function instead of waiting.
    ///
    /// ```rust
    /// use slackwater::{DeferredValue, Variant};
    ///
    /// let double = DeferredValue::resolved(|x: i32| x * 2);
    /// let value = DeferredValue::lazy(|| 21);
    /// let applied = value.apply(&double);
    /// assert_eq!(applied.variant(), Variant::Deferred);
    /// assert_eq!(applied.to_option(), Some(42));
    /// ```
    pub fn apply<U, F>(&self, function: &DeferredValue<F>) -> DeferredValue<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Clone + Send + 'static,
    {
        let function = function.clone();
        match self.snapshot() {
            Snapshot::Ready(outcome) => match function.snapshot() {
                Snapshot::Pending(pending) => DeferredValue::from_handle(pending.then(move |f| {
                    let value = outcome?;
                    let f = f?;
                    Ok(f(value))
                })),
                _ => DeferredValue::from_outcome(run_guarded(move || {
                    let value = outcome?;
                    let f = function.try_get()?;
                    Ok(f(value))
                })),
            },
            Snapshot::Lazy => {
                let upstream = self.clone();
                DeferredValue::from_thunk(move || {
                    let value = upstream.try_get()?;
                    let f = function.try_get()?;
                    Ok(f(value))
                })
            }
            Snapshot::Pending(handle) => DeferredValue::from_handle(handle.then(move |outcome| {
                let value = outcome?;
                let f = function.try_get()?;
                Ok(f(value))
            })),
        }
    }

    /// Chain a computation that itself produces a deferred value.
    ///
    /// Equivalent to `map(f).join()`.
    ///
    /// ```rust
    /// use slackwater::DeferredValue;
    ///
    /// let user_id = DeferredValue::lazy(|| 7);
    /// let profile = user_id.bind(|id| DeferredValue::lazy(move || format!("user-{}", id)));
    /// assert_eq!(profile.to_option(), Some("user-7".to_string()));
    /// ```
    pub fn bind<U, F>(&self, f: F) -> DeferredValue<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> DeferredValue<U> + Send + 'static,
    {
        self.map(f).join()
    }

    /// Complete `completer` with this value's outcome once it is available.
    fn forward_to(&self, completer: Completer<T>) {
        match self.snapshot() {
            Snapshot::Ready(outcome) => completer.complete(outcome),
            Snapshot::Lazy => completer.complete(self.try_get()),
            Snapshot::Pending(handle) => {
                handle.on_complete(move |outcome| completer.complete(outcome.clone()))
            }
        }
    }
}

impl<U: Clone + Send + 'static> DeferredValue<DeferredValue<U>> {
    /// Flatten exactly one level of nesting.
    ///
    /// Forcing the result forces the outer value and then the inner one, with
    /// the same rules as [`try_get`](DeferredValue::try_get). For an `Async`
    /// outer value the result is `Async` and nothing blocks.
    pub fn join(&self) -> DeferredValue<U> {
        match self.snapshot() {
            Snapshot::Ready(Ok(inner)) => inner,
            Snapshot::Ready(Err(err)) => DeferredValue::failed(err),
            Snapshot::Lazy => {
                let outer = self.clone();
                DeferredValue::from_thunk(move || outer.try_get()?.try_get())
            }
            Snapshot::Pending(handle) => {
                let (completer, joined) = AsyncHandle::channel();
                handle.on_complete(move |outcome| match outcome {
                    Ok(inner) => inner.forward_to(completer),
                    Err(err) => completer.fail(err.clone()),
                });
                DeferredValue::from_handle(joined)
            }
        }
    }
}

impl<T: Clone + Send + 'static> IntoFuture for DeferredValue<T> {
    type Output = Outcome<T>;
    type IntoFuture = DeferredFuture<T>;

    /// Await the value without blocking an executor thread.
    ///
    /// `Deferred` values are evaluated on the shared worker pool first.
    fn into_future(self) -> Self::IntoFuture {
        let value = self.evaluate();
        match value.snapshot() {
            Snapshot::Ready(outcome) => DeferredFuture::ready(outcome),
            Snapshot::Pending(handle) => handle.into_future(),
            Snapshot::Lazy => DeferredFuture::ready(value.try_get()),
        }
    }
}

impl<T> fmt::Debug for DeferredValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("DeferredValue");
        match self.cell.state.try_lock() {
            Ok(state) => out.field("variant", &state.variant()),
            Err(TryLockError::Poisoned(poisoned)) => {
                out.field("variant", &poisoned.into_inner().variant())
            }
            Err(TryLockError::WouldBlock) => out.field("variant", &"<locked>"),
        };
        out.finish()
    }
}
