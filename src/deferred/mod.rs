//! Deferred values: resolved, lazy, or asynchronous, behind one type.
//!
//! A [`DeferredValue`] is backed by exactly one of three representations:
//!
//! - **Resolved** – the outcome is already known ([`DeferredValue::resolved`]).
//! - **Deferred** – a thunk runs on demand ([`DeferredValue::lazy`],
//!   [`DeferredValue::try_lazy`], [`DeferredValue::lazy_option`]).
//! - **Async** – an [`AsyncHandle`] will deliver the outcome
//!   ([`DeferredValue::from_handle`], [`DeferredValue::evaluate`]).
//!
//! Once an outcome is available the value is permanently resolved and every
//! subscribed effect has run exactly once.
//!
//! # Forcing
//!
//! | Operation | Deferred | Async |
//! |-----------|----------|-------|
//! | `map` / `apply` / `bind` | new lazy value | chained on completion |
//! | `evaluate` | submitted to the pool | unchanged |
//! | `try_get` / `to_result` / `to_option` | thunk runs inline | blocks |
//! | `.await` | evaluated on the pool, then awaited | awaited |
//!
//! # Example
//!
//! ```rust
//! use slackwater::DeferredValue;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let runs = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&runs);
//! let report = DeferredValue::lazy(move || {
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     vec![3, 1, 2]
//! })
//! .map(|mut rows| {
//!     rows.sort();
//!     rows
//! });
//!
//! // Nothing has run yet.
//! assert_eq!(runs.load(Ordering::SeqCst), 0);
//! assert_eq!(report.to_option(), Some(vec![1, 2, 3]));
//! assert_eq!(report.to_option(), Some(vec![1, 2, 3]));
//! assert_eq!(runs.load(Ordering::SeqCst), 1);
//! ```

mod handle;
mod latch;
mod pool;
mod value;

#[cfg(test)]
mod tests;

pub use handle::{AsyncHandle, Completer, DeferredFuture};
pub use pool::WorkerPool;
pub use value::{DeferredValue, Variant};

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{DeferredError, Outcome};

/// Lock ignoring poison: guarded state here is always left consistent, and
/// user code runs under `catch_unwind`.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run a thunk, turning a panic into [`DeferredError::Panicked`].
pub(crate) fn run_guarded<T, F>(thunk: F) -> Outcome<T>
where
    F: FnOnce() -> Outcome<T>,
{
    panic::catch_unwind(AssertUnwindSafe(thunk))
        .unwrap_or_else(|payload| Err(DeferredError::from_panic(payload)))
}
