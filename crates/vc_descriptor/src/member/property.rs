use alloc::sync::Arc;
use core::fmt;
use core::ops::Deref;

use super::{Member, MemberDescriptor};
use crate::attribute::{Attribute, AttributeCollection, AttributeRef, ExtenderProvided, ReadOnly};
use crate::error::MetaError;
use crate::ty::{PropertyDecl, Type};

// -----------------------------------------------------------------------------
// PropertyDescriptor

struct PropertyData {
    member: MemberDescriptor,
    component_type: Type,
    property_type: Type,
    read_only: bool,
}

/// A property of a component type.
///
/// Cloning shares the descriptor; [`ptr_eq`](Member::ptr_eq) tells clones
/// apart from equal but separately built descriptors.
///
/// # Example
///
/// ```
/// use vc_descriptor::attribute::Category;
/// use vc_descriptor::member::PropertyDescriptor;
/// use vc_descriptor::ty::Type;
///
/// let text = Type::builder("Text").build().unwrap();
/// let label = Type::builder("Label").build().unwrap();
///
/// let prop = PropertyDescriptor::builder("Caption", &label, &text)
///     .attribute(Category::new("Appearance"))
///     .build()
///     .unwrap();
///
/// assert_eq!(prop.name(), "Caption");
/// assert_eq!(prop.category(), "Appearance");
/// assert!(!prop.is_read_only());
/// ```
#[derive(Clone)]
pub struct PropertyDescriptor(Arc<PropertyData>);

impl PropertyDescriptor {
    /// Starts building property `name` of `component_type`.
    pub fn builder(name: &str, component_type: &Type, property_type: &Type) -> PropertyBuilder {
        PropertyBuilder {
            name: name.into(),
            component_type: component_type.clone(),
            property_type: property_type.clone(),
            attributes: Vec::new(),
            read_only: false,
        }
    }

    /// Describes a declared property. Declarations are validated by the type builder.
    pub(crate) fn from_decl(decl: &PropertyDecl, component_type: &Type) -> Self {
        let attributes = AttributeCollection::new(decl.attributes.iter().cloned());
        let read_only = decl.read_only || attributes.get_of::<ReadOnly>().is_some_and(|r| r.0);
        Self(Arc::new(PropertyData {
            member: MemberDescriptor::new_unchecked(&decl.name, attributes),
            component_type: component_type.clone(),
            property_type: decl.property_type.clone(),
            read_only,
        }))
    }

    /// Returns a copy whose attributes are overridden by `overrides`.
    pub fn with_attributes(&self, overrides: &[AttributeRef]) -> Self {
        let attributes = self.attributes().with_overrides(overrides);
        let read_only = self.0.read_only || attributes.get_of::<ReadOnly>().is_some_and(|r| r.0);
        Self(Arc::new(PropertyData {
            member: MemberDescriptor::new_unchecked(self.name(), attributes),
            component_type: self.0.component_type.clone(),
            property_type: self.0.property_type.clone(),
            read_only,
        }))
    }

    /// The type declaring the property.
    #[inline]
    pub fn component_type(&self) -> &Type {
        &self.0.component_type
    }

    #[inline]
    pub fn property_type(&self) -> &Type {
        &self.0.property_type
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.0.read_only
    }

    /// The site name of the extender provider that contributed this property.
    pub fn extender_name(&self) -> Option<&str> {
        self.attributes()
            .get_of::<ExtenderProvided>()
            .and_then(ExtenderProvided::provider_name)
    }

    /// Whether an extender provider contributed this property.
    #[inline]
    pub fn is_extender(&self) -> bool {
        self.attributes().get_of::<ExtenderProvided>().is_some()
    }
}

impl Deref for PropertyDescriptor {
    type Target = MemberDescriptor;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0.member
    }
}

impl Member for PropertyDescriptor {
    #[inline]
    fn member(&self) -> &MemberDescriptor {
        &self.0.member
    }

    #[inline]
    fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for PropertyDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.0.member == other.0.member
                && self.0.property_type == other.0.property_type
                && self.0.component_type == other.0.component_type
                && self.0.read_only == other.0.read_only)
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name())
            .field("component_type", &self.0.component_type)
            .field("property_type", &self.0.property_type)
            .field("read_only", &self.0.read_only)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// PropertyBuilder

/// Builder returned by [`PropertyDescriptor::builder`].
pub struct PropertyBuilder {
    name: Box<str>,
    component_type: Type,
    property_type: Type,
    attributes: Vec<AttributeRef>,
    read_only: bool,
}

impl PropertyBuilder {
    pub fn attribute(self, attribute: impl Attribute) -> Self {
        self.attribute_ref(Arc::new(attribute))
    }

    pub fn attribute_ref(mut self, attribute: AttributeRef) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn build(self) -> Result<PropertyDescriptor, MetaError> {
        let attributes = AttributeCollection::new(self.attributes);
        let read_only = self.read_only || attributes.get_of::<ReadOnly>().is_some_and(|r| r.0);
        Ok(PropertyDescriptor(Arc::new(PropertyData {
            member: MemberDescriptor::new(&self.name, attributes)?,
            component_type: self.component_type,
            property_type: self.property_type,
            read_only,
        })))
    }
}

// -----------------------------------------------------------------------------
// Tests
