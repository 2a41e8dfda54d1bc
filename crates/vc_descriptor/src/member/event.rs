use alloc::sync::Arc;
use core::fmt;
use core::ops::Deref;

use super::{Member, MemberDescriptor};
use crate::attribute::{Attribute, AttributeCollection, AttributeRef};
use crate::error::MetaError;
use crate::ty::{EventDecl, Type};

// -----------------------------------------------------------------------------
// EventDescriptor

struct EventData {
    member: MemberDescriptor,
    component_type: Type,
    handler_type: Type,
    multicast: bool,
}

/// An event of a component type.
#[derive(Clone)]
pub struct EventDescriptor(Arc<EventData>);

impl EventDescriptor {
    /// Starts building a multicast event `name` of `component_type`.
    pub fn builder(name: &str, component_type: &Type, handler_type: &Type) -> EventBuilder {
        EventBuilder {
            name: name.into(),
            component_type: component_type.clone(),
            handler_type: handler_type.clone(),
            attributes: Vec::new(),
            multicast: true,
        }
    }

    pub(crate) fn from_decl(decl: &EventDecl, component_type: &Type) -> Self {
        let attributes = AttributeCollection::new(decl.attributes.iter().cloned());
        Self(Arc::new(EventData {
            member: MemberDescriptor::new_unchecked(&decl.name, attributes),
            component_type: component_type.clone(),
            handler_type: decl.handler_type.clone(),
            multicast: decl.multicast,
        }))
    }

    #[inline]
    pub fn component_type(&self) -> &Type {
        &self.0.component_type
    }

    #[inline]
    pub fn handler_type(&self) -> &Type {
        &self.0.handler_type
    }

    #[inline]
    pub fn is_multicast(&self) -> bool {
        self.0.multicast
    }
}

impl Deref for EventDescriptor {
    type Target = MemberDescriptor;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0.member
    }
}

impl Member for EventDescriptor {
    #[inline]
    fn member(&self) -> &MemberDescriptor {
        &self.0.member
    }

    #[inline]
    fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for EventDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.0.member == other.0.member
                && self.0.handler_type == other.0.handler_type
                && self.0.component_type == other.0.component_type
                && self.0.multicast == other.0.multicast)
    }
}

impl fmt::Debug for EventDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDescriptor")
            .field("name", &self.name())
            .field("component_type", &self.0.component_type)
            .field("handler_type", &self.0.handler_type)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// EventBuilder

/// Builder returned by [`EventDescriptor::builder`].
pub struct EventBuilder {
    name: Box<str>,
    component_type: Type,
    handler_type: Type,
    attributes: Vec<AttributeRef>,
    multicast: bool,
}

impl EventBuilder {
    pub fn attribute(self, attribute: impl Attribute) -> Self {
        self.attribute_ref(Arc::new(attribute))
    }

    pub fn attribute_ref(mut self, attribute: AttributeRef) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn unicast(mut self) -> Self {
        self.multicast = false;
        self
    }

    pub fn build(self) -> Result<EventDescriptor, MetaError> {
        Ok(EventDescriptor(Arc::new(EventData {
            member: MemberDescriptor::new(&self.name, AttributeCollection::new(self.attributes))?,
            component_type: self.component_type,
            handler_type: self.handler_type,
            multicast: self.multicast,
        })))
    }
}
