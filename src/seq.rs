//! Immutable, order-preserving sequences with partitioned parallel operations.
//!
//! A [`Seq`] is a window onto shared, immutable storage. Cloning, slicing and
//! partitioning are cheap and never copy elements; operations that produce new
//! elements allocate fresh storage. No operation can change a sequence that has
//! already been handed out.
//!
//! # Example
//!
//! ```rust
//! use slackwater::{seq, Seq};
//!
//! let words = seq!["one", "two", "three", "four"];
//! assert_eq!(words.par_map(|w| w.len(), 2), seq![3, 3, 5, 4]);
//!
//! let numbers: Seq<u64> = (1..=100_000).collect();
//! assert_eq!(numbers.par_fold(|a, b| a + b, 0, 4_096), 5_000_050_000);
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Index, Range};
use std::slice;
use std::sync::Arc;

use crate::deferred::DeferredValue;
use crate::monoid::{Monoid, MonoidStructure};
use crate::parallel::{ranges_for_workers, ranges_of_size, Parallel};
use crate::semigroup::Semigroup;

/// Build a [`Seq`] from a list of elements, like `vec!`.
///
/// ```rust
/// use slackwater::seq;
///
/// let empty: slackwater::Seq<i32> = seq![];
/// assert!(empty.is_empty());
/// assert_eq!(seq![7; 3].to_vec(), vec![7, 7, 7]);
/// assert_eq!(seq![1, 2, 3].len(), 3);
/// ```
#[macro_export]
macro_rules! seq {
    () => {
        $crate::Seq::new()
    };
    ($item:expr; $count:expr) => {
        $crate::Seq::from_vec(::std::vec![$item; $count])
    };
    ($($item:expr),+ $(,)?) => {
        $crate::Seq::from_vec(::std::vec![$($item),+])
    };
}

/// An immutable, ordered, finite sequence.
pub struct Seq<T> {
    storage: Arc<[T]>,
    start: usize,
    end: usize,
}

impl<T> Seq<T> {
    /// The empty sequence.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Take ownership of `items` without copying.
    pub fn from_vec(items: Vec<T>) -> Self {
        let storage: Arc<[T]> = Arc::from(items);
        let end = storage.len();
        Self {
            storage,
            start: 0,
            end,
        }
    }

    /// Pull elements from `next` until it returns `None`.
    ///
    /// ```rust
    /// use slackwater::Seq;
    ///
    /// let mut n = 1;
    /// let powers = Seq::from_fn(|| {
    ///     n *= 2;
    ///     (n <= 32).then_some(n)
    /// });
    /// assert_eq!(powers.to_vec(), vec![2, 4, 8, 16, 32]);
    /// ```
    pub fn from_fn<F>(next: F) -> Self
    where
        F: FnMut() -> Option<T>,
    {
        std::iter::from_fn(next).collect()
    }

    /// `len` elements, the element at `i` being `f(i)`.
    pub fn generate<F>(len: usize, f: F) -> Self
    where
        F: FnMut(usize) -> T,
    {
        (0..len).map(f).collect()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// `true` if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.storage[self.start..self.end]
    }

    /// Element at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// First element, if any.
    pub fn first(&self) -> Option<&T> {
        self.as_slice().first()
    }

    /// Last element, if any.
    pub fn last(&self) -> Option<&T> {
        self.as_slice().last()
    }

    /// Iterate over the elements in order.
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// `true` if both sequences are windows onto the same storage.
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// The elements in `range`, clamped to the sequence bounds. Never copies.
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        self.window(start..end)
    }

    fn window(&self, range: Range<usize>) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            start: self.start + range.start,
            end: self.start + range.end,
        }
    }

    /// Contiguous chunks of at most `size` elements, in order. The last chunk
    /// may be shorter. A size of zero is treated as one.
    ///
    /// ```rust
    /// use slackwater::seq;
    ///
    /// let chunks = seq![1, 2, 3, 4, 5].partition(2);
    /// assert_eq!(chunks, vec![seq![1, 2], seq![3, 4], seq![5]]);
    /// ```
    pub fn partition(&self, size: usize) -> Vec<Self> {
        ranges_of_size(self.len(), size)
            .into_iter()
            .map(|range| self.window(range))
            .collect()
    }

    /// At most `parts` non-empty contiguous slices of near-equal length, in
    /// order.
    pub fn split(&self, parts: usize) -> Vec<Self> {
        ranges_for_workers(self.len(), parts)
            .into_iter()
            .map(|range| self.window(range))
            .collect()
    }

    /// Apply `f` to every element.
    pub fn map<U, F>(&self, f: F) -> Seq<U>
    where
        F: FnMut(&T) -> U,
    {
        self.iter().map(f).collect()
    }

    /// Apply `f` to every element, keeping the `Some` results.
    pub fn filter_map<U, F>(&self, f: F) -> Seq<U>
    where
        F: FnMut(&T) -> Option<U>,
    {
        self.iter().filter_map(f).collect()
    }

    /// Left fold.
    pub fn fold<B, F>(&self, init: B, f: F) -> B
    where
        F: FnMut(B, &T) -> B,
    {
        self.iter().fold(init, f)
    }

    /// Map every element with `f` on at most `workers` worker threads.
    ///
    /// The sequence is split into at most `workers` contiguous slices, each
    /// processed sequentially by its own worker; outputs are concatenated in
    /// slice order. An element whose `f` panics is dropped rather than
    /// failing the whole operation.
    ///
    /// Uses [`Parallel::default`]; build a [`Parallel`] to control thread
    /// names and logging.
    pub fn par_map<U, F>(&self, f: F, workers: usize) -> Seq<U>
    where
        T: Send + Sync,
        U: Send,
        F: Fn(&T) -> U + Sync,
    {
        Parallel::default().map(self, f, workers)
    }

    /// Like [`par_map`](Self::par_map), also dropping elements for which `f`
    /// returns `None`.
    pub fn par_filter_map<U, F>(&self, f: F, workers: usize) -> Seq<U>
    where
        T: Send + Sync,
        U: Send,
        F: Fn(&T) -> Option<U> + Sync,
    {
        Parallel::default().filter_map(self, f, workers)
    }
}

impl<T: Clone> Seq<T> {
    /// Copy the elements into a `Vec`.
    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }

    /// A new sequence with `item` added at the end.
    pub fn append(&self, item: T) -> Self {
        self.iter().cloned().chain(std::iter::once(item)).collect()
    }

    /// A new sequence with `item` added at the front.
    pub fn prepend(&self, item: T) -> Self {
        std::iter::once(item).chain(self.iter().cloned()).collect()
    }

    /// `self` followed by `other`.
    pub fn concat(&self, other: &Self) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        self.iter().chain(other.iter()).cloned().collect()
    }

    /// Elements satisfying `predicate`, in order.
    pub fn filter<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&T) -> bool,
    {
        self.iter().filter(|item| predicate(item)).cloned().collect()
    }

    /// Map every element to a sequence and concatenate the results.
    pub fn flat_map<U, F>(&self, mut f: F) -> Seq<U>
    where
        U: Clone,
        F: FnMut(&T) -> Seq<U>,
    {
        self.iter()
            .flat_map(|item| f(item).to_vec())
            .collect()
    }

    /// Elements in reverse order.
    pub fn reverse(&self) -> Self {
        self.iter().rev().cloned().collect()
    }

    /// Fold with an associative `op`, each chunk of at most `partition_size`
    /// elements on its own worker thread.
    ///
    /// Partial results are recombined in chunk order, so the result equals the
    /// sequential left fold from `identity` even when `op` is not commutative.
    /// Panics in `op` propagate once all workers have finished.
    ///
    /// ```rust
    /// use slackwater::seq;
    ///
    /// let parts = seq!["a", "b", "c", "d", "e"].map(|s| s.to_string());
    /// let joined = parts.par_fold(|a, b| a + &b, String::new(), 2);
    /// assert_eq!(joined, "abcde");
    /// ```
    pub fn par_fold<F>(&self, op: F, identity: T, partition_size: usize) -> T
    where
        T: Send + Sync,
        F: Fn(T, T) -> T + Sync,
    {
        MonoidStructure::new(self.clone(), op, identity).par_fold(partition_size)
    }
}

impl<T: Clone + Send + 'static> Seq<DeferredValue<T>> {
    /// Submit every lazy element to the shared worker pool. Never blocks.
    pub fn evaluate_all(&self) -> Self {
        self.map(DeferredValue::evaluate)
    }

    /// Force every element, keeping successful values in order and dropping
    /// bottoms.
    pub fn collect_resolved(&self) -> Seq<T> {
        self.filter_map(DeferredValue::to_option)
    }

    /// A lazy value holding every element's value, or the first bottom in
    /// sequence order.
    ///
    /// ```rust
    /// use slackwater::{seq, DeferredValue};
    ///
    /// let all = seq![DeferredValue::resolved(1), DeferredValue::lazy(|| 2)].sequence();
    /// assert_eq!(all.to_option().map(|s| s.to_vec()), Some(vec![1, 2]));
    /// ```
    pub fn sequence(&self) -> DeferredValue<Seq<T>>
    where
        T: Sync,
    {
        let values = self.clone();
        DeferredValue::from_thunk(move || values.iter().map(DeferredValue::try_get).collect())
    }
}

impl<T> Clone for Seq<T> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            start: self.start,
            end: self.end,
        }
    }
}

impl<T> Default for Seq<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Seq<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for Seq<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for Seq<T> {}

impl<T: Hash> Hash for Seq<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl<T> Index<usize> for Seq<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<T> AsRef<[T]> for Seq<T> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> From<Vec<T>> for Seq<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_vec(items)
    }
}

impl<T> FromIterator<T> for Seq<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a Seq<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Clone> IntoIterator for Seq<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.to_vec().into_iter()
    }
}

impl<T: Clone> Semigroup for Seq<T> {
    fn combine(self, other: Self) -> Self {
        self.concat(&other)
    }
}

impl<T: Clone> Monoid for Seq<T> {
    fn empty() -> Self {
        Self::new()
    }
}

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for Seq<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(feature = "serde")]
impl<'de, T: serde::Deserialize<'de>> serde::Deserialize<'de> for Seq<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::from_vec)
    }
}

#[cfg(feature = "proptest")]
use proptest::prelude::*;

#[cfg(feature = "proptest")]
impl<T> Arbitrary for Seq<T>
where
    T: Arbitrary + 'static,
{
    type Parameters = T::Parameters;
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(args: Self::Parameters) -> Self::Strategy {
        proptest::collection::vec(any_with::<T>(args), 0..64)
            .prop_map(Seq::from_vec)
            .boxed()
    }
}
