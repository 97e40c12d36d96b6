//! Equality Comparator
//!
//! Decides whether a freshly evaluated value is "the same" as the one a
//! watcher saw last time. Two modes exist:
//!
//! - **Reference** (the default): identity for shared handles (`Rc`), plain
//!   equality for owned values. In-place mutation behind a shared handle is
//!   invisible in this mode.
//! - **Structural**: deep comparison of contents. A watcher in this mode
//!   stores a [`snapshot`](Watchable::snapshot) of the value, so later
//!   mutation of the live value cannot leak into the stored copy.
//!
//! In both modes NaN equals NaN. A value that is NaN on every evaluation
//! would otherwise be dirty forever and the digest could never converge.

use std::cell::RefCell;
use std::rc::Rc;

/// A value that can be observed by a watcher.
pub trait Watchable: Clone + 'static {
    /// Reference-mode comparison.
    fn same(&self, other: &Self) -> bool;

    /// Structural-mode comparison.
    fn structurally_eq(&self, other: &Self) -> bool;

    /// A deep copy that shares no mutable state with `self`.
    fn snapshot(&self) -> Self;
}

/// Compare `new` against `old` under the requested mode.
pub fn values_equal<V: Watchable>(new: &V, old: &V, structural: bool) -> bool {
    if structural {
        new.structurally_eq(old)
    } else {
        new.same(old)
    }
}

macro_rules! impl_watchable_by_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Watchable for $ty {
                fn same(&self, other: &Self) -> bool {
                    self == other
                }

                fn structurally_eq(&self, other: &Self) -> bool {
                    self == other
                }

                fn snapshot(&self) -> Self {
                    self.clone()
                }
            }
        )*
    };
}

impl_watchable_by_eq!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    String,
    &'static str,
);

macro_rules! impl_watchable_float {
    ($($ty:ty),*) => {
        $(
            impl Watchable for $ty {
                fn same(&self, other: &Self) -> bool {
                    self == other || (self.is_nan() && other.is_nan())
                }

                fn structurally_eq(&self, other: &Self) -> bool {
                    self.same(other)
                }

                fn snapshot(&self) -> Self {
                    *self
                }
            }
        )*
    };
}

impl_watchable_float!(f32, f64);

impl<T: Watchable> Watchable for Option<T> {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same(b),
            (None, None) => true,
            _ => false,
        }
    }

    fn structurally_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.structurally_eq(b),
            (None, None) => true,
            _ => false,
        }
    }

    fn snapshot(&self) -> Self {
        self.as_ref().map(Watchable::snapshot)
    }
}

impl<T: Watchable> Watchable for Vec<T> {
    fn same(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same(b))
    }

    fn structurally_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().zip(other).all(|(a, b)| a.structurally_eq(b))
    }

    fn snapshot(&self) -> Self {
        self.iter().map(Watchable::snapshot).collect()
    }
}

/// Shared strings: identity in reference mode.
impl Watchable for Rc<str> {
    fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }

    fn structurally_eq(&self, other: &Self) -> bool {
        **self == **other
    }

    fn snapshot(&self) -> Self {
        Rc::from(&**self)
    }
}

/// Shared mutable containers: identity in reference mode, contents in
/// structural mode.
impl<T: Watchable> Watchable for Rc<RefCell<T>> {
    fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }

    fn structurally_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other) || self.borrow().structurally_eq(&other.borrow())
    }

    fn snapshot(&self) -> Self {
        Rc::new(RefCell::new(self.borrow().snapshot()))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
