//! Attribute values and their keyed collection.
//!
//! ## Menu
//!
//! - [`Attribute`]: the trait every attribute value implements.
//! - [`AttributeKey`]: the per-attribute-kind identity token.
//! - [`AttributeCollection`]: a read-only, kind-deduplicated attribute list.
//! - Built-in attributes interpreted by the pipeline:
//!   [`Browsable`], [`Category`], [`Description`], [`DisplayName`],
//!   [`ReadOnly`], [`DefaultProperty`], [`DefaultEvent`], [`ExtenderProvided`].

// -----------------------------------------------------------------------------
// Modules

mod builtin;
mod collection;

// -----------------------------------------------------------------------------
// Exports

pub use builtin::{Browsable, Category, Description, DisplayName, ReadOnly};
pub use builtin::{DefaultEvent, DefaultProperty, ExtenderProvided};
pub use collection::AttributeCollection;

// -----------------------------------------------------------------------------
// Attribute

use alloc::sync::Arc;
use core::any::{Any, TypeId};
use core::fmt::Debug;

/// A shared attribute value.
pub type AttributeRef = Arc<dyn Attribute>;

/// Stable identity of an attribute *kind*.
///
/// Collections hold at most one attribute per key, and attribute filters
/// look members up by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeKey(TypeId);

impl AttributeKey {
    /// The key of attribute type `T`.
    #[inline]
    pub fn of<T: Attribute>() -> Self {
        Self(TypeId::of::<T>())
    }

    #[inline]
    pub const fn type_id(self) -> TypeId {
        self.0
    }
}

/// A metadata value attached to a type, property or event.
///
/// `equals` is value equality. `matches` is what attribute filters use and
/// defaults to `equals`. `is_default_attribute` reports whether the value is
/// the one a member implicitly has when the attribute is absent.
///
/// # Example
///
/// ```
/// use vc_descriptor::attribute::{Attribute, eq_by_value};
///
/// #[derive(Debug, PartialEq)]
/// struct Unit(&'static str);
///
/// impl Attribute for Unit {
///     fn equals(&self, other: &dyn Attribute) -> bool {
///         eq_by_value(self, other)
///     }
/// }
///
/// let a: &dyn Attribute = &Unit("px");
/// assert!(a.equals(&Unit("px")));
/// assert!(!a.is_default_attribute());
/// assert_eq!(a.downcast_ref::<Unit>(), Some(&Unit("px")));
/// ```
pub trait Attribute: Any + Send + Sync + Debug {
    /// The kind token of this attribute.
    fn key(&self) -> AttributeKey {
        AttributeKey(TypeId::of::<Self>())
    }

    fn equals(&self, other: &dyn Attribute) -> bool;

    fn matches(&self, other: &dyn Attribute) -> bool {
        self.equals(other)
    }

    fn is_default_attribute(&self) -> bool {
        false
    }
}

impl dyn Attribute {
    /// Returns `true` if the attribute is a `T`.
    #[inline]
    pub fn is<T: Attribute>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }

    /// Downcasts to the concrete attribute type.
    #[inline]
    pub fn downcast_ref<T: Attribute>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }
}

/// `equals` for attributes with a [`PartialEq`] implementation.
pub fn eq_by_value<T: Attribute + PartialEq>(this: &T, other: &dyn Attribute) -> bool {
    other.downcast_ref::<T>().is_some_and(|other| other == this)
}
