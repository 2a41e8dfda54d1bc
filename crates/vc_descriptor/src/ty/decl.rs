use alloc::sync::Arc;
use core::any::Any;

use vc_utils::TypeIdMap;

use crate::attribute::{Attribute, AttributeRef};
use crate::component::Instance;
use crate::descriptor::TypeConverter;
use crate::error::MetaError;
use crate::ty::Type;

// -----------------------------------------------------------------------------
// Aliases

/// A lazily evaluated, fallible producer of type-level attributes.
///
/// Sources run when the reflection layer fills a type's attribute list.
/// A failing source is skipped (and retried on the next query) instead of
/// failing the whole list.
pub type AttributeSource = Arc<dyn Fn() -> Result<Vec<AttributeRef>, MetaError> + Send + Sync>;

/// Creates a fresh instance of a type.
pub type InstanceFactory = Arc<dyn Fn() -> Instance + Send + Sync>;

/// An editor object, looked up by the `TypeId` of its editor kind.
pub type EditorRef = Arc<dyn Any + Send + Sync>;

// -----------------------------------------------------------------------------
// PropertyDecl

/// A property declared on a [`Type`].
#[derive(Clone, Debug)]
pub struct PropertyDecl {
    pub(crate) name: Box<str>,
    pub(crate) property_type: Type,
    pub(crate) attributes: Vec<AttributeRef>,
    pub(crate) read_only: bool,
}

impl PropertyDecl {
    /// Declares property `name` of type `property_type`.
    pub fn new(name: &str, property_type: &Type) -> Self {
        Self {
            name: name.into(),
            property_type: property_type.clone(),
            attributes: Vec::new(),
            read_only: false,
        }
    }

    /// Adds an attribute to the property.
    pub fn attribute(self, attribute: impl Attribute) -> Self {
        self.attribute_ref(Arc::new(attribute))
    }

    /// Adds a shared attribute to the property.
    pub fn attribute_ref(mut self, attribute: AttributeRef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Marks the property read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Returns the declared name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

// -----------------------------------------------------------------------------
// EventDecl

/// An event declared on a [`Type`].
#[derive(Clone, Debug)]
pub struct EventDecl {
    pub(crate) name: Box<str>,
    pub(crate) handler_type: Type,
    pub(crate) attributes: Vec<AttributeRef>,
    pub(crate) multicast: bool,
}

impl EventDecl {
    /// Declares a multicast event `name` whose handlers have type `handler_type`.
    pub fn new(name: &str, handler_type: &Type) -> Self {
        Self {
            name: name.into(),
            handler_type: handler_type.clone(),
            attributes: Vec::new(),
            multicast: true,
        }
    }

    /// Adds an attribute to the event.
    pub fn attribute(self, attribute: impl Attribute) -> Self {
        self.attribute_ref(Arc::new(attribute))
    }

    /// Adds a shared attribute to the event.
    pub fn attribute_ref(mut self, attribute: AttributeRef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Restricts the event to a single handler.
    pub fn unicast(mut self) -> Self {
        self.multicast = false;
        self
    }

    /// Returns the declared name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

// -----------------------------------------------------------------------------
// TypeDecl

/// Everything the reflection layer reads from a type.
#[derive(Default)]
pub(crate) struct TypeDecl {
    pub attributes: Vec<AttributeRef>,
    pub attribute_sources: Vec<AttributeSource>,
    pub properties: Vec<PropertyDecl>,
    pub events: Vec<EventDecl>,
    pub converter: Option<Arc<dyn TypeConverter>>,
    pub editors: TypeIdMap<EditorRef>,
    pub factory: Option<InstanceFactory>,
}
