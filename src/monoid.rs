//! Monoids and monoid-driven folds.
//!
//! A [`Monoid`] is a [`Semigroup`] with an identity element:
//!
//! ```text
//! M::empty().combine(a) == a == a.combine(M::empty())
//! ```
//!
//! [`MonoidStructure`] packages a collection with an associative operation
//! and its identity, and folds it either sequentially ([`MonoidStructure::fold`])
//! or chunk-by-chunk on worker threads ([`MonoidStructure::par_fold`]). Both
//! produce the same result whenever the operation is associative; commutativity
//! is never required.
//!
//! # Examples
//!
//! ```
//! use slackwater::monoid::{fold_all, MonoidStructure, Sum};
//! use slackwater::Seq;
//!
//! assert_eq!(fold_all(vec![Sum(2), Sum(3), Sum(5)]), Sum(10));
//!
//! let lines: Seq<String> = ["GET ", "/index", " 200"].iter().map(|s| s.to_string()).collect();
//! let log = MonoidStructure::from_monoid(lines);
//! assert_eq!(log.fold(), "GET /index 200");
//! assert_eq!(log.par_fold(1), "GET /index 200");
//! ```

use std::fmt;
use std::ops::{Add, Mul};

use crate::parallel::Parallel;
use crate::semigroup::Semigroup;
use crate::seq::Seq;

/// A [`Semigroup`] with an identity element.
pub trait Monoid: Semigroup {
    /// The identity for [`combine`](Semigroup::combine).
    fn empty() -> Self;
}

impl<T> Monoid for Vec<T> {
    fn empty() -> Self {
        Vec::new()
    }
}

impl Monoid for String {
    fn empty() -> Self {
        String::new()
    }
}

impl<T: Semigroup> Monoid for Option<T> {
    fn empty() -> Self {
        None
    }
}

macro_rules! tuple_monoid {
    ($($T:ident),+) => {
        impl<$($T: Monoid),+> Monoid for ($($T,)+) {
            fn empty() -> Self {
                ($($T::empty(),)+)
            }
        }
    };
}

tuple_monoid!(A, B);
tuple_monoid!(A, B, C);
tuple_monoid!(A, B, C, D);
tuple_monoid!(A, B, C, D, E);
tuple_monoid!(A, B, C, D, E, F);

/// Numbers under addition. Identity: `T::default()`.
///
/// ```
/// use slackwater::monoid::Sum;
/// use slackwater::Semigroup;
///
/// assert_eq!(Sum(5).combine(Sum(10)), Sum(15));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Sum<T>(pub T);

impl<T: Add<Output = T>> Semigroup for Sum<T> {
    fn combine(self, other: Self) -> Self {
        Sum(self.0 + other.0)
    }
}

impl<T: Add<Output = T> + Default> Monoid for Sum<T> {
    fn empty() -> Self {
        Sum(T::default())
    }
}

/// Numbers under multiplication. Identity: [`One::one`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Product<T>(pub T);

/// Multiplicative identity.
pub trait One {
    /// The value `1`.
    fn one() -> Self;
}

macro_rules! one_for {
    ($one:expr => $($t:ty),+) => {
        $(impl One for $t {
            fn one() -> Self {
                $one
            }
        })+
    };
}

one_for!(1 => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
one_for!(1.0 => f32, f64);

impl<T: Mul<Output = T>> Semigroup for Product<T> {
    fn combine(self, other: Self) -> Self {
        Product(self.0 * other.0)
    }
}

impl<T: Mul<Output = T> + One> Monoid for Product<T> {
    fn empty() -> Self {
        Product(T::one())
    }
}

/// Largest value wins. A semigroup only; wrap in `Option` for an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Max<T>(pub T);

impl<T: Ord> Semigroup for Max<T> {
    fn combine(self, other: Self) -> Self {
        Max(self.0.max(other.0))
    }
}

/// Smallest value wins. A semigroup only; wrap in `Option` for an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Min<T>(pub T);

impl<T: Ord> Semigroup for Min<T> {
    fn combine(self, other: Self) -> Self {
        Min(self.0.min(other.0))
    }
}

/// Sequentially fold `items` from [`Monoid::empty`].
pub fn fold_all<M, I>(items: I) -> M
where
    M: Monoid,
    I: IntoIterator<Item = M>,
{
    items.into_iter().fold(M::empty(), M::combine)
}

/// Fold `items` from [`Monoid::empty`] in chunks of at most `partition_size`
/// elements, folded on the default executor's workers.
///
/// ```
/// use slackwater::monoid::{par_fold_all, Sum};
/// use slackwater::Seq;
///
/// let items: Seq<Sum<u64>> = (1..=1_000).map(Sum).collect();
/// assert_eq!(par_fold_all(&items, 64), Sum(500_500));
/// ```
pub fn par_fold_all<M>(items: &Seq<M>, partition_size: usize) -> M
where
    M: Monoid + Clone + Send + Sync,
{
    MonoidStructure::from_monoid(items.clone()).par_fold(partition_size)
}

/// A collection together with an associative operation and its identity.
///
/// `op` must be associative and `identity` must be neutral for it; neither is
/// checked. Under those conditions [`fold`](Self::fold) and
/// [`par_fold`](Self::par_fold) agree for every partition size.
///
/// ```
/// use slackwater::monoid::MonoidStructure;
///
/// let widest = MonoidStructure::new(vec![3, 9, 4], |a: u32, b: u32| a.max(b), 0);
/// assert_eq!(widest.fold(), 9);
///
/// let nothing = MonoidStructure::new(Vec::<u32>::new(), |a: u32, b: u32| a.max(b), 0);
/// assert_eq!(nothing.fold(), 0);
/// ```
#[derive(Clone)]
pub struct MonoidStructure<T, F> {
    items: Seq<T>,
    op: F,
    identity: T,
}

impl<T, F> MonoidStructure<T, F>
where
    T: Clone,
    F: Fn(T, T) -> T,
{
    /// Snapshot `items` with `op` and its `identity`.
    pub fn new(items: impl Into<Seq<T>>, op: F, identity: T) -> Self {
        Self {
            items: items.into(),
            op,
            identity,
        }
    }

    /// The elements being folded.
    pub fn items(&self) -> &Seq<T> {
        &self.items
    }

    /// The identity element.
    pub fn identity(&self) -> &T {
        &self.identity
    }

    /// Apply the operation to two values.
    pub fn combine(&self, left: T, right: T) -> T {
        (self.op)(left, right)
    }

    /// Left fold starting at the identity. An empty collection yields the
    /// identity unchanged.
    pub fn fold(&self) -> T {
        self.items
            .iter()
            .cloned()
            .fold(self.identity.clone(), &self.op)
    }

    /// Fold chunks of at most `partition_size` elements on separate workers,
    /// then fold the partial results in chunk order from the identity.
    ///
    /// A partition size of zero is treated as one. Panics in the operation
    /// propagate to the caller after every worker has finished.
    pub fn par_fold(&self, partition_size: usize) -> T
    where
        T: Send + Sync,
        F: Sync,
    {
        self.par_fold_with(&Parallel::default(), partition_size)
    }

    /// [`par_fold`](Self::par_fold) on a configured executor.
    pub fn par_fold_with(&self, parallel: &Parallel, partition_size: usize) -> T
    where
        T: Send + Sync,
        F: Sync,
    {
        parallel.fold(
            &self.items,
            &self.op,
            self.identity.clone(),
            partition_size,
        )
    }
}

impl<M: Monoid + Clone> MonoidStructure<M, fn(M, M) -> M> {
    /// Use `M`'s own [`combine`](Semigroup::combine) and
    /// [`empty`](Monoid::empty).
    pub fn from_monoid(items: impl Into<Seq<M>>) -> Self {
        Self::new(items, M::combine, M::empty())
    }
}

impl<T: fmt::Debug, F> fmt::Debug for MonoidStructure<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonoidStructure")
            .field("items", &self.items)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
