use core::fmt;
use core::hash::{BuildHasher, Hash, Hasher};
use core::ops::Deref;

use crate::hash::FixedHashState;

// -----------------------------------------------------------------------------
// Hashed

/// A value carrying its [`FixedHashState`] hash, computed once.
///
/// Member names are stored this way so that lookups by name compare a `u64`
/// before comparing strings.
///
/// ```
/// use vc_utils::hash::Hashed;
///
/// let name: Hashed<Box<str>> = Hashed::new("Caption".into());
/// assert_eq!(name.hash(), Hashed::<Box<str>>::hash_one("Caption"));
/// assert_eq!(&**name, "Caption");
/// ```
#[derive(Clone)]
pub struct Hashed<V> {
    hash: u64,
    value: V,
}

impl<V: Hash> Hashed<V> {
    pub fn new(value: V) -> Self {
        Self {
            hash: FixedHashState.hash_one(&value),
            value,
        }
    }

    /// The hash [`new`](Self::new) would store for a value borrowing as `value`.
    #[inline]
    pub fn hash_one<Q: Hash + ?Sized>(value: &Q) -> u64 {
        FixedHashState.hash_one(value)
    }
}

impl<V> Hashed<V> {
    #[inline]
    pub const fn hash(&self) -> u64 {
        self.hash
    }
}

/// Writes only the stored hash.
impl<V> Hash for Hashed<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl<V> Deref for Hashed<V> {
    type Target = V;

    #[inline]
    fn deref(&self) -> &V {
        &self.value
    }
}

impl<V: PartialEq> PartialEq for Hashed<V> {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.value == other.value
    }
}

impl<V: Eq> Eq for Hashed<V> {}

impl<V: fmt::Debug> fmt::Debug for Hashed<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}
