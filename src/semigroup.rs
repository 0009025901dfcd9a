//! Associative combination.
//!
//! A [`Semigroup`] has a single binary operation, `combine`, which must be
//! associative. Associativity is exactly what lets a fold be split into
//! contiguous chunks, reduced independently and stitched back together in
//! order, which is how [`Seq::par_fold`](crate::Seq::par_fold) works.
//!
//! ```text
//! a.combine(b).combine(c) == a.combine(b.combine(c))
//! ```
//!
//! Commutativity is *not* required: `"ab".combine("c")` and
//! `"c".combine("ab")` differ, and the parallel fold keeps chunk order so the
//! result is still deterministic.
//!
//! # Example
//!
//! ```
//! use slackwater::Semigroup;
//!
//! let header = (vec!["id"], "users".to_string());
//! let more = (vec!["email"], "_v2".to_string());
//! assert_eq!(
//!     header.combine(more),
//!     (vec!["id", "email"], "users_v2".to_string())
//! );
//! ```

/// A type with an associative binary operation.
///
/// `combine` consumes both operands; clone beforehand to keep them.
pub trait Semigroup: Sized {
    /// Combine `self` with `other`, `self` on the left.
    fn combine(self, other: Self) -> Self;
}

impl<T> Semigroup for Vec<T> {
    #[inline]
    fn combine(mut self, other: Self) -> Self {
        self.extend(other);
        self
    }
}

impl Semigroup for String {
    #[inline]
    fn combine(mut self, other: Self) -> Self {
        self.push_str(&other);
        self
    }
}

/// `None` is neutral; two `Some`s combine their contents.
impl<T: Semigroup> Semigroup for Option<T> {
    #[inline]
    fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Some(left), Some(right)) => Some(left.combine(right)),
            (left @ Some(_), None) => left,
            (None, right) => right,
        }
    }
}

macro_rules! tuple_semigroup {
    ($($idx:tt $T:ident),+) => {
        impl<$($T: Semigroup),+> Semigroup for ($($T,)+) {
            #[inline]
            fn combine(self, other: Self) -> Self {
                ($(self.$idx.combine(other.$idx),)+)
            }
        }
    };
}

tuple_semigroup!(0 A, 1 B);
tuple_semigroup!(0 A, 1 B, 2 C);
tuple_semigroup!(0 A, 1 B, 2 C, 3 D);
tuple_semigroup!(0 A, 1 B, 2 C, 3 D, 4 E);
tuple_semigroup!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
