//! Property and event descriptors.
//!
//! ## Menu
//!
//! - [`MemberDescriptor`]: the name and attributes shared by every member.
//! - [`PropertyDescriptor`] / [`EventDescriptor`]: shared, identity-comparable
//!   member handles.
//! - [`MemberCollection`]: a read-only list of members, aliased as
//!   [`PropertyCollection`] and [`EventCollection`].

// -----------------------------------------------------------------------------
// Modules

mod collection;
mod event;
mod property;

// -----------------------------------------------------------------------------
// Exports

pub use collection::{EventCollection, MemberCollection, PropertyCollection};
pub use event::{EventBuilder, EventDescriptor};
pub use property::{PropertyBuilder, PropertyDescriptor};

// -----------------------------------------------------------------------------
// MemberDescriptor

use core::fmt;

use vc_utils::hash::Hashed;

use crate::attribute::{AttributeCollection, Browsable, Category, Description, DisplayName};
use crate::error::MetaError;
use crate::ty::validate_name;

/// Name and attributes of a property or event.
///
/// The name is case-sensitive and hashed once on construction.
///
/// Two members are equal when their names, categories, descriptions and
/// attribute sets (in any order) are equal.
#[derive(Clone)]
pub struct MemberDescriptor {
    name: Hashed<Box<str>>,
    attributes: AttributeCollection,
}

impl MemberDescriptor {
    /// Creates a member, rejecting blank names.
    pub fn new(name: &str, attributes: AttributeCollection) -> Result<Self, MetaError> {
        validate_name("name", name)?;
        Ok(Self::new_unchecked(name, attributes))
    }

    #[inline]
    pub(crate) fn new_unchecked(name: &str, attributes: AttributeCollection) -> Self {
        Self {
            name: Hashed::new(name.into()),
            attributes,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn name_hash(&self) -> u64 {
        self.name.hash()
    }

    #[inline]
    pub fn attributes(&self) -> &AttributeCollection {
        &self.attributes
    }

    /// The declared [`Category`], or [`Category::DEFAULT`].
    pub fn category(&self) -> &str {
        self.attributes
            .get_of::<Category>()
            .map_or(Category::DEFAULT, |c| &*c.0)
    }

    /// The declared [`Description`], or an empty string.
    pub fn description(&self) -> &str {
        self.attributes
            .get_of::<Description>()
            .map_or("", |d| &*d.0)
    }

    /// The declared [`DisplayName`], falling back to the member name.
    pub fn display_name(&self) -> &str {
        match self.attributes.get_of::<DisplayName>() {
            Some(display) if !display.0.is_empty() => &*display.0,
            _ => self.name(),
        }
    }

    /// Whether the member carries no `Browsable(false)`.
    pub fn is_browsable(&self) -> bool {
        self.attributes.get_of::<Browsable>().is_none_or(|b| b.0)
    }

    /// Returns `true` if the name equals `name`.
    #[inline]
    pub(crate) fn is_named(&self, hash: u64, name: &str) -> bool {
        self.name.hash() == hash && &**self.name == name
    }
}

impl PartialEq for MemberDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.category() == other.category()
            && self.description() == other.description()
            && self.attributes == other.attributes
    }
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name())
            .field("attributes", &self.attributes)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Member

/// Common access to [`PropertyDescriptor`] and [`EventDescriptor`].
pub trait Member: Clone + Send + Sync + 'static {
    fn member(&self) -> &MemberDescriptor;

    /// Returns `true` if both handles point to the same descriptor.
    fn ptr_eq(&self, other: &Self) -> bool;
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::MemberDescriptor;
    use crate::attribute::{AttributeCollection, AttributeRef, Browsable, Category, Description};

    fn attrs(list: Vec<AttributeRef>) -> AttributeCollection {
        AttributeCollection::new(list)
    }

    #[test]
    fn equality_ignores_attribute_order() {
        let a = MemberDescriptor::new(
            "Text",
            attrs(vec![
                Arc::new(Category::new("Layout")),
                Arc::new(Browsable(false)),
            ]),
        )
        .unwrap();
        let b = MemberDescriptor::new(
            "Text",
            attrs(vec![
                Arc::new(Browsable(false)),
                Arc::new(Category::new("Layout")),
            ]),
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.category(), "Layout");
        assert!(!a.is_browsable());

        let c = MemberDescriptor::new("text", b.attributes().clone()).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn defaults_and_display_name() {
        let m = MemberDescriptor::new("Size", AttributeCollection::empty()).unwrap();
        assert_eq!(m.category(), Category::DEFAULT);
        assert_eq!(m.description(), "");
        assert_eq!(m.display_name(), "Size");
        assert!(m.is_browsable());

        let d = MemberDescriptor::new(
            "Size",
            attrs(vec![Arc::new(Description::new("How big"))]),
        )
        .unwrap();
        assert_ne!(m, d);
        assert!(MemberDescriptor::new(" ", AttributeCollection::empty()).is_err());
    }
}
