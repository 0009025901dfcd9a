//! Worker pool used to evaluate deferred thunks off the calling thread.

use std::fmt;
use std::io;
use std::sync::OnceLock;

use futures::executor::ThreadPool;

use super::handle::AsyncHandle;
use super::run_guarded;
use crate::config::Settings;
use crate::error::Outcome;

static SHARED: OnceLock<Option<WorkerPool>> = OnceLock::new();

/// A pool of worker threads that turns thunks into [`AsyncHandle`]s.
///
/// # Example
///
/// ```rust
/// use slackwater::deferred::WorkerPool;
/// use slackwater::Settings;
///
/// let pool = WorkerPool::new(&Settings::default().with_pool_size(2)).unwrap();
/// let handle = pool.submit(|| Ok(21 * 2));
/// assert_eq!(handle.wait(), Ok(42));
/// ```
pub struct WorkerPool {
    pool: ThreadPool,
    settings: Settings,
}

impl WorkerPool {
    /// Build a pool sized and named from `settings`.
    pub fn new(settings: &Settings) -> io::Result<Self> {
        let size = settings.effective_pool_size();
        let pool = ThreadPool::builder()
            .pool_size(size)
            .name_prefix(format!("{}-worker-", settings.thread_name()))
            .create()?;
        tracing::debug!(size, name = settings.thread_name(), "worker pool started");
        Ok(Self {
            pool,
            settings: settings.clone(),
        })
    }

    /// The process-wide pool used by [`DeferredValue::evaluate`](crate::DeferredValue::evaluate).
    ///
    /// Created on first use with default settings. Returns `None` if the
    /// threads could not be spawned; the failure is logged once.
    pub fn shared() -> Option<&'static WorkerPool> {
        SHARED
            .get_or_init(|| match WorkerPool::new(&Settings::default()) {
                Ok(pool) => Some(pool),
                Err(err) => {
                    tracing::warn!("failed to start shared worker pool: {}", err);
                    None
                }
            })
            .as_ref()
    }

    /// Run `thunk` on a pool thread.
    ///
    /// Panics inside `thunk` complete the handle with
    /// [`DeferredError::Panicked`](crate::DeferredError::Panicked).
    pub fn submit<T, F>(&self, thunk: F) -> AsyncHandle<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> Outcome<T> + Send + 'static,
    {
        let (completer, handle) = AsyncHandle::channel();
        if self.settings.verbose() {
            tracing::debug!(pool = self.settings.thread_name(), "submitting thunk");
        }
        self.pool.spawn_ok(async move {
            completer.complete(run_guarded(thunk));
        });
        handle
    }

    /// Settings this pool was built from.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("settings", &self.settings)
            .finish()
    }
}
