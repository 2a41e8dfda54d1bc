use alloc::sync::Arc;
use core::fmt;
use core::ops::Deref;

use vc_utils::hash::Hashed;

use super::{EventDescriptor, Member, PropertyDescriptor};

// -----------------------------------------------------------------------------
// MemberCollection

/// A read-only, ordered list of members.
///
/// Unlike [`AttributeCollection`](crate::attribute::AttributeCollection),
/// names may repeat: merged lists keep every contribution.
pub struct MemberCollection<M>(Arc<[M]>);

/// Properties returned by the pipeline.
pub type PropertyCollection = MemberCollection<PropertyDescriptor>;

/// Events returned by the pipeline.
pub type EventCollection = MemberCollection<EventDescriptor>;

impl<M: Member> MemberCollection<M> {
    pub fn new(members: Vec<M>) -> Self {
        Self(members.into())
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    #[inline]
    pub(crate) fn from_shared(shared: Arc<[M]>) -> Self {
        Self(shared)
    }

    /// Returns the first member called `name`.
    pub fn find(&self, name: &str) -> Option<&M> {
        let hash = Hashed::<Box<str>>::hash_one(name);
        self.0.iter().find(|m| m.member().is_named(hash, name))
    }

    /// Returns `true` if both collections share the same allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns `true` if both hold the same descriptors, by identity, in order.
    pub fn same_elements(&self, other: &Self) -> bool {
        same_elements(&self.0, &other.0)
    }

    #[inline]
    pub(crate) fn shared(&self) -> &Arc<[M]> {
        &self.0
    }
}

/// Element-wise identity comparison in order.
pub(crate) fn same_elements<M: Member>(a: &[M], b: &[M]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.ptr_eq(y))
}

impl<M> Clone for MemberCollection<M> {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<M: Member> Default for MemberCollection<M> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<M> Deref for MemberCollection<M> {
    type Target = [M];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<M: Member> FromIterator<M> for MemberCollection<M> {
    fn from_iter<I: IntoIterator<Item = M>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<M: PartialEq> PartialEq for MemberCollection<M> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl<M: fmt::Debug> fmt::Debug for MemberCollection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::PropertyCollection;
    use crate::member::PropertyDescriptor;
    use crate::ty::Type;

    #[test]
    fn find_and_identity() {
        let text = Type::builder("Text").build().unwrap();
        let owner = Type::builder("Owner").build().unwrap();
        let a = PropertyDescriptor::builder("A", &owner, &text).build().unwrap();
        let b = PropertyDescriptor::builder("B", &owner, &text).build().unwrap();

        let list = PropertyCollection::new(vec![a.clone(), b.clone()]);
        assert_eq!(list.find("B").map(|p| p.name()), Some("B"));
        assert!(list.find("b").is_none());

        let same = PropertyCollection::new(vec![a.clone(), b.clone()]);
        assert!(list.same_elements(&same));
        assert!(!list.ptr_eq(&same));

        let rebuilt = PropertyDescriptor::builder("A", &owner, &text).build().unwrap();
        let other = PropertyCollection::new(vec![rebuilt, b]);
        assert!(!list.same_elements(&other));
        assert_eq!(list, other);
    }
}
