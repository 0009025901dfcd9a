//! Runtime settings for worker pools and partitioned operations.
//!
//! Settings are plain data, passed explicitly to the components that use them
//! ([`WorkerPool`](crate::deferred::WorkerPool) and
//! [`Parallel`](crate::parallel::Parallel)). There is no global switch.
//!
//! # Examples
//!
//! ```rust
//! use slackwater::Settings;
//!
//! let settings = Settings::default()
//!     .with_verbose(true)
//!     .with_pool_size(4)
//!     .with_thread_name("ingest");
//!
//! assert!(settings.verbose());
//! assert_eq!(settings.pool_size(), Some(4));
//! assert_eq!(settings.thread_name(), "ingest");
//! ```

use std::num::NonZeroUsize;

const DEFAULT_THREAD_NAME: &str = "slackwater";

/// Configuration shared by the worker pool and the partitioned operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Settings {
    verbose: bool,
    pool_size: Option<usize>,
    thread_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbose: false,
            pool_size: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl Settings {
    /// Emit per-partition and per-submission debug events.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Fix the number of threads in pools built from these settings.
    ///
    /// A size of zero is treated as one.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = Some(size.max(1));
        self
    }

    /// Prefix used to name pool and partition worker threads.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Whether verbose events are enabled.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// The configured pool size, if any.
    pub fn pool_size(&self) -> Option<usize> {
        self.pool_size
    }

    /// Pool size to actually use: the configured size, or the machine's
    /// available parallelism.
    ///
    /// ```rust
    /// use slackwater::Settings;
    ///
    /// assert_eq!(Settings::default().with_pool_size(3).effective_pool_size(), 3);
    /// assert!(Settings::default().effective_pool_size() >= 1);
    /// ```
    pub fn effective_pool_size(&self) -> usize {
        self.pool_size.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }

    /// Thread name prefix.
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }
}
