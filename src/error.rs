//! Error taxonomy for deferred values
//!
//! Every way a [`DeferredValue`](crate::DeferredValue) can fail to produce a
//! usable value is captured as a [`DeferredError`]. Errors are cheap to clone so
//! that a memoized bottom can be observed by every clone of a deferred value and
//! by every callback subscribed to it.
//!
//! # Examples
//!
//! ```
//! use slackwater::{DeferredError, DeferredValue};
//!
//! let missing = DeferredValue::<i32>::from_option(None);
//! assert!(matches!(missing, Err(DeferredError::MissingInput(_))));
//!
//! let absent = DeferredValue::<i32>::lazy_option(|| None);
//! assert_eq!(absent.to_result(), Err(DeferredError::Absent));
//! ```

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Shared, type-erased failure raised by a fallible thunk.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// The outcome of forcing a deferred computation.
pub type Outcome<T> = Result<T, DeferredError>;

/// Reasons a deferred value did not produce a value.
///
/// The first four variants are *bottoms*: outcomes of evaluation that can be
/// recovered from through [`to_result`](crate::DeferredValue::to_result) and
/// [`to_option`](crate::DeferredValue::to_option). The remaining variants are
/// raised synchronously by the operation that was called.
#[derive(Debug, Clone)]
pub enum DeferredError {
    /// A fallible thunk returned an error.
    Failed(SharedError),
    /// A thunk, mapping function, or combinator panicked while being forced.
    Panicked(String),
    /// A thunk completed without producing a value.
    Absent,
    /// The producing side of an async handle went away without completing it.
    Abandoned,
    /// A required input was missing at construction time.
    MissingInput(&'static str),
    /// A bounded wait elapsed before the value was available.
    TimedOut(Duration),
    /// The requested operation is part of the contract but is not supported.
    Unsupported(&'static str),
}

impl DeferredError {
    /// Wrap an arbitrary error as a [`DeferredError::Failed`].
    pub fn failed<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        DeferredError::Failed(Arc::new(error))
    }

    /// Build a [`DeferredError::Panicked`] from an unwinding payload.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        DeferredError::Panicked(message)
    }

    /// Whether this error is an evaluation bottom (as opposed to a usage error).
    ///
    /// ```
    /// use slackwater::DeferredError;
    ///
    /// assert!(DeferredError::Absent.is_bottom());
    /// assert!(!DeferredError::Unsupported("cancel").is_bottom());
    /// ```
    pub fn is_bottom(&self) -> bool {
        matches!(
            self,
            DeferredError::Failed(_)
                | DeferredError::Panicked(_)
                | DeferredError::Absent
                | DeferredError::Abandoned
        )
    }
}

impl fmt::Display for DeferredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferredError::Failed(err) => write!(f, "deferred computation failed: {}", err),
            DeferredError::Panicked(msg) => write!(f, "deferred computation panicked: {}", msg),
            DeferredError::Absent => write!(f, "deferred computation produced no value"),
            DeferredError::Abandoned => {
                write!(f, "async handle was abandoned before completion")
            }
            DeferredError::MissingInput(what) => write!(f, "missing required input: {}", what),
            DeferredError::TimedOut(after) => write!(f, "timed out after {:?}", after),
            DeferredError::Unsupported(op) => write!(f, "operation not supported: {}", op),
        }
    }
}

impl StdError for DeferredError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            DeferredError::Failed(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

// Shared failures compare by identity; everything else structurally.
impl PartialEq for DeferredError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DeferredError::Failed(a), DeferredError::Failed(b)) => Arc::ptr_eq(a, b),
            (DeferredError::Panicked(a), DeferredError::Panicked(b)) => a == b,
            (DeferredError::Absent, DeferredError::Absent) => true,
            (DeferredError::Abandoned, DeferredError::Abandoned) => true,
            (DeferredError::MissingInput(a), DeferredError::MissingInput(b)) => a == b,
            (DeferredError::TimedOut(a), DeferredError::TimedOut(b)) => a == b,
            (DeferredError::Unsupported(a), DeferredError::Unsupported(b)) => a == b,
            _ => false,
        }
    }
}
