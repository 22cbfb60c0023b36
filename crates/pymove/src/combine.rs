use indexmap::IndexSet;

use crate::config::NestingPolicy;

/// Merging of configuration layers
pub trait Combine {
    /// Combine two values, preferring the values in `self`.
    ///
    /// Scalars from the higher precedence layer win outright. Collections from both layers are
    /// merged, with the items of the higher precedence layer placed first.
    #[must_use]
    fn combine(self, other: Self) -> Self;
}

macro_rules! impl_combine_or {
    ($name:ty) => {
        impl Combine for Option<$name> {
            fn combine(self, other: Option<$name>) -> Option<$name> {
                self.or(other)
            }
        }
    };
}

impl_combine_or!(bool);
impl_combine_or!(NestingPolicy);

impl<T> Combine for Option<Vec<T>>
where
    T: PartialEq,
{
    /// Combine two vectors by extending the higher precedence vector (`self`) with the items of
    /// the lower precedence vector (`other`) it does not already contain.
    fn combine(self, other: Option<Vec<T>>) -> Option<Vec<T>> {
        match (self, other) {
            (Some(mut a), Some(b)) => {
                for item in b {
                    if !a.contains(&item) {
                        a.push(item);
                    }
                }
                Some(a)
            }
            (a, b) => a.or(b),
        }
    }
}

impl<T> Combine for Option<IndexSet<T>>
where
    T: Eq + std::hash::Hash,
{
    /// Combine two IndexSets by extending the set in `self` with the set in `other`, if they're
    /// both `Some`.
    fn combine(self, other: Option<IndexSet<T>>) -> Option<IndexSet<T>> {
        match (self, other) {
            (Some(mut a), Some(b)) => {
                a.extend(b);
                Some(a)
            }
            (a, b) => a.or(b),
        }
    }
}
