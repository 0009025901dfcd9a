//! # Slackwater
//!
//! Deferred values and partitioned folds.
//!
//! - [`DeferredValue`] holds one value that is already known, computed on
//!   demand, or delivered by an asynchronous computation. Composition is lazy
//!   and never blocks; failures and panics are kept as outcomes and surface
//!   only when the value is consumed.
//! - [`Seq`] is an immutable ordered sequence whose `par_map` and `par_fold`
//!   spread contiguous partitions over a bounded set of worker threads and
//!   recombine results in order.
//! - [`MonoidStructure`] folds a collection with an associative operation and
//!   its identity, sequentially or in parallel, with identical results.
//!
//! ## Quick Example
//!
//! ```rust
//! use slackwater::prelude::*;
//!
//! // Nothing runs until the value is consumed.
//! let config = DeferredValue::try_lazy(|| "8".parse::<usize>());
//! let workers = config.map(|n| n.max(1));
//!
//! let words = seq!["still", "waters", "run", "deep"];
//! let lengths = words.par_map(|w| w.len(), workers.to_option().unwrap_or(1));
//! assert_eq!(lengths, seq![5, 6, 3, 4]);
//!
//! let total = MonoidStructure::new(lengths, |a: usize, b: usize| a + b, 0).par_fold(2);
//! assert_eq!(total, 18);
//! ```
//!
//! Logging goes through [`tracing`]; install any subscriber to see pool and
//! partition events, and set [`Settings::with_verbose`] for per-partition
//! detail.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod deferred;
pub mod error;
pub mod monoid;
pub mod parallel;
pub mod semigroup;
pub mod seq;

// Re-exports
pub use config::Settings;
pub use deferred::{AsyncHandle, Completer, DeferredValue, Variant};
pub use error::{DeferredError, Outcome};
pub use monoid::{Monoid, MonoidStructure};
pub use parallel::Parallel;
pub use semigroup::Semigroup;
pub use seq::Seq;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::deferred::{AsyncHandle, Completer, DeferredValue, Variant};
    pub use crate::error::{DeferredError, Outcome};
    pub use crate::monoid::{Monoid, MonoidStructure};
    pub use crate::parallel::Parallel;
    pub use crate::semigroup::Semigroup;
    pub use crate::seq;
    pub use crate::seq::Seq;
}
