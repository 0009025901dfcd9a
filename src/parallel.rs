//! Partitioned execution on scoped worker threads.
//!
//! A [`Parallel`] executor splits a [`Seq`] into contiguous partitions and
//! hands them, in index order, to a bounded set of named worker threads (at
//! most [`Settings::effective_pool_size`] live at once). Every worker is joined
//! before returning. Results are always recombined in partition order, so
//! output order never depends on scheduling.
//!
//! Workers borrow the input directly (`std::thread::scope`), which is why the
//! element type only needs to be `Sync` rather than `'static`.
//!
//! # Example
//!
//! ```rust
//! use slackwater::parallel::Parallel;
//! use slackwater::{seq, Settings};
//!
//! let parallel = Parallel::new(Settings::default().with_thread_name("lengths"));
//! let words = seq!["one", "two", "three", "four"];
//!
//! let lengths = parallel.map(&words, |word| word.len(), 3);
//! assert_eq!(lengths, seq![3, 3, 5, 4]);
//!
//! let total = parallel.fold(&lengths, |a, b| a + b, 0, 2);
//! assert_eq!(total, 15);
//! ```

use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crate::config::Settings;
use crate::error::DeferredError;
use crate::seq::Seq;

/// Contiguous ranges of at most `size` covering `0..len`. A size of zero is
/// treated as one.
pub(crate) fn ranges_of_size(len: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..len)
        .step_by(size)
        .map(|start| start..len.min(start + size))
        .collect()
}

/// At most `parts` non-empty contiguous ranges covering `0..len`, with lengths
/// differing by no more than one.
pub(crate) fn ranges_for_workers(len: usize, parts: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let parts = parts.clamp(1, len);
    let (base, extra) = (len / parts, len % parts);
    let mut start = 0;
    (0..parts)
        .map(|index| {
            let width = base + usize::from(index < extra);
            let range = start..start + width;
            start += width;
            range
        })
        .collect()
}

/// Partition results tagged with their index.
type Claimed<R> = Vec<(usize, thread::Result<R>)>;

/// Executor for partitioned operations.
///
/// Carries the [`Settings`] that name worker threads and control verbose
/// logging. `Parallel::default()` is what the `Seq::par_*` shorthands use.
#[derive(Debug, Clone, Default)]
pub struct Parallel {
    settings: Settings,
}

impl Parallel {
    /// Executor using `settings`.
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Settings this executor was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run `work` on every partition and return the results in partition
    /// order.
    ///
    /// At most [`Settings::effective_pool_size`] worker threads run at once;
    /// each claims the next unprocessed partition until none are left. Blocks
    /// until every worker has finished. If `work` panics on a partition, the
    /// first panic (in partition order) is resumed on the caller once all
    /// workers have joined. If no worker thread can be spawned, the partitions
    /// run on the calling thread.
    pub fn scatter<T, R, F>(&self, partitions: &[Seq<T>], work: F) -> Vec<R>
    where
        T: Send + Sync,
        R: Send,
        F: Fn(usize, &Seq<T>) -> R + Sync,
    {
        if let [only] = partitions {
            return vec![work(0, only)];
        }
        let workers = self.settings.effective_pool_size().min(partitions.len());
        if self.settings.verbose() {
            tracing::debug!(
                partitions = partitions.len(),
                workers,
                name = self.settings.thread_name(),
                "dispatching partitions"
            );
        }

        let next = AtomicUsize::new(0);
        let drain = || -> Claimed<R> {
            let mut claimed = Vec::new();
            loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let partition = match partitions.get(index) {
                    Some(partition) => partition,
                    None => return claimed,
                };
                let result = panic::catch_unwind(AssertUnwindSafe(|| work(index, partition)));
                claimed.push((index, result));
            }
        };

        let mut finished: Claimed<R> = thread::scope(|scope| {
            let drain = &drain;
            let mut handles = Vec::with_capacity(workers);
            for worker in 0..workers {
                let spawned = thread::Builder::new()
                    .name(format!("{}-part-{}", self.settings.thread_name(), worker))
                    .spawn_scoped(scope, drain);
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        tracing::warn!(worker, "could not spawn partition worker: {}", err);
                        break;
                    }
                }
            }
            if handles.is_empty() {
                return drain();
            }

            let mut finished = Vec::with_capacity(partitions.len());
            for handle in handles {
                match handle.join() {
                    Ok(claimed) => finished.extend(claimed),
                    Err(payload) => panic::resume_unwind(payload),
                }
            }
            finished
        });
        finished.sort_by_key(|(index, _)| *index);

        if self.settings.verbose() {
            tracing::debug!(partitions = finished.len(), "partitions joined");
        }

        let mut results = Vec::with_capacity(finished.len());
        for (_, result) in finished {
            match result {
                Ok(value) => results.push(value),
                Err(payload) => panic::resume_unwind(payload),
            }
        }
        results
    }

    /// Apply `f` to every element using at most `workers` partitions.
    ///
    /// Elements for which `f` panics are dropped; survivors keep their
    /// relative order.
    pub fn map<T, U, F>(&self, items: &Seq<T>, f: F, workers: usize) -> Seq<U>
    where
        T: Send + Sync,
        U: Send,
        F: Fn(&T) -> U + Sync,
    {
        self.filter_map(items, move |item| Some(f(item)), workers)
    }

    /// Like [`map`](Self::map), also dropping elements for which `f` returns
    /// `None`.
    pub fn filter_map<T, U, F>(&self, items: &Seq<T>, f: F, workers: usize) -> Seq<U>
    where
        T: Send + Sync,
        U: Send,
        F: Fn(&T) -> Option<U> + Sync,
    {
        let partitions = items.split(workers);
        let outputs = self.scatter(&partitions, |index, partition| {
            let mut kept = Vec::with_capacity(partition.len());
            for item in partition {
                match panic::catch_unwind(AssertUnwindSafe(|| f(item))) {
                    Ok(Some(value)) => kept.push(value),
                    Ok(None) => {}
                    Err(payload) => {
                        tracing::debug!(
                            partition = index,
                            "dropping element: {}",
                            DeferredError::from_panic(payload)
                        );
                    }
                }
            }
            kept
        });

        let mut merged = Vec::with_capacity(items.len());
        for kept in outputs {
            merged.extend(kept);
        }
        if self.settings.verbose() {
            tracing::debug!(
                input = items.len(),
                output = merged.len(),
                "partitioned map complete"
            );
        }
        Seq::from_vec(merged)
    }

    /// Fold `items` with an associative `op`, each chunk of at most
    /// `partition_size` elements on its own worker.
    ///
    /// Every chunk is folded left to right from `identity`; the partial
    /// results are then folded left to right, in chunk order, from `identity`
    /// on the calling thread. `op` need not be commutative.
    pub fn fold<T, F>(&self, items: &Seq<T>, op: F, identity: T, partition_size: usize) -> T
    where
        T: Clone + Send + Sync,
        F: Fn(T, T) -> T + Sync,
    {
        let chunks = items.partition(partition_size);
        let partials = self.scatter(&chunks, |_, chunk| {
            chunk.iter().cloned().fold(identity.clone(), &op)
        });
        partials.into_iter().fold(identity, &op)
    }
}
