use alloc::sync::Arc;
use core::fmt;
use core::ops::Deref;

use vc_utils::TypeIdMap;

use super::{Attribute, AttributeKey, AttributeRef};

// -----------------------------------------------------------------------------
// AttributeCollection

/// A read-only list of attributes holding at most one attribute per
/// [`AttributeKey`].
///
/// Construction keeps the position of the first attribute of a kind and the
/// value of the last one, so later declarations override earlier ones.
///
/// Cloning shares the underlying allocation, which lets pipeline stages
/// compare collections by identity.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vc_descriptor::attribute::{AttributeCollection, Browsable, ReadOnly};
///
/// let attrs = AttributeCollection::new([
///     Arc::new(Browsable(true)) as _,
///     Arc::new(ReadOnly(true)) as _,
///     Arc::new(Browsable(false)) as _,
/// ]);
///
/// assert_eq!(attrs.len(), 2);
/// assert_eq!(attrs.get_of::<Browsable>(), Some(&Browsable(false)));
/// assert!(attrs.contains(&ReadOnly(true)));
/// ```
#[derive(Clone)]
pub struct AttributeCollection(Arc<[AttributeRef]>);

impl AttributeCollection {
    /// Creates an empty collection.
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    /// Creates a collection, deduplicating by attribute kind.
    pub fn new(attributes: impl IntoIterator<Item = AttributeRef>) -> Self {
        Self(dedup(attributes).into())
    }

    /// Wraps an already built list, only copying it if it holds duplicate kinds.
    pub(crate) fn from_shared(shared: Arc<[AttributeRef]>) -> Self {
        let mut seen = TypeIdMap::with_capacity(shared.len());
        let unique = shared
            .iter()
            .all(|attr| seen.try_insert(attr.key().type_id(), || ()));
        if unique {
            Self(shared)
        } else {
            Self::new(shared.iter().cloned())
        }
    }

    /// Returns a collection where `overrides` replace attributes of the same kind.
    ///
    /// Returns a clone of `self` (same allocation) when `overrides` is empty.
    pub fn with_overrides(&self, overrides: &[AttributeRef]) -> Self {
        if overrides.is_empty() {
            return self.clone();
        }
        Self::new(self.0.iter().chain(overrides).cloned())
    }

    /// Returns the attribute of the given kind.
    pub fn get(&self, key: AttributeKey) -> Option<&AttributeRef> {
        self.0.iter().find(|attr| attr.key() == key)
    }

    /// Returns the attribute of type `T`.
    pub fn get_of<T: Attribute>(&self) -> Option<&T> {
        self.get(AttributeKey::of::<T>())
            .and_then(|attr| attr.downcast_ref::<T>())
    }

    #[inline]
    pub fn contains_key(&self, key: AttributeKey) -> bool {
        self.get(key).is_some()
    }

    /// Returns `true` if an equal attribute of the same kind is present.
    pub fn contains(&self, attribute: &dyn Attribute) -> bool {
        self.get(attribute.key())
            .is_some_and(|found| attribute.equals(&**found))
    }

    /// Returns `true` if an attribute of the same kind is present and
    /// `attribute` matches it.
    pub fn matches(&self, attribute: &dyn Attribute) -> bool {
        self.get(attribute.key())
            .is_some_and(|found| attribute.matches(&**found))
    }

    /// Returns `true` if both collections share the same allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[inline]
    pub(crate) fn shared(&self) -> &Arc<[AttributeRef]> {
        &self.0
    }
}

fn dedup(attributes: impl IntoIterator<Item = AttributeRef>) -> Vec<AttributeRef> {
    let mut slots = TypeIdMap::new();
    let mut list: Vec<AttributeRef> = Vec::new();
    for attr in attributes {
        let key = attr.key().type_id();
        match slots.get(&key) {
            Some(&index) => list[index] = attr,
            None => {
                slots.insert(key, list.len());
                list.push(attr);
            }
        }
    }
    list
}

impl Default for AttributeCollection {
    fn default() -> Self {
        Self::empty()
    }
}

impl Deref for AttributeCollection {
    type Target = [AttributeRef];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<AttributeRef> for AttributeCollection {
    fn from_iter<I: IntoIterator<Item = AttributeRef>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Order-independent: same size, and every attribute has an equal
/// counterpart of the same kind.
impl PartialEq for AttributeCollection {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.len() == other.len() && self.iter().all(|attr| other.contains(&**attr)))
    }
}

impl fmt::Debug for AttributeCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

// -----------------------------------------------------------------------------
// Tests
