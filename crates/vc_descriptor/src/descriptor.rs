//! The read-only descriptor view returned by providers.

use alloc::sync::Arc;
use core::any::TypeId;
use core::fmt::Debug;

use crate::attribute::AttributeCollection;
use crate::component::Instance;
use crate::error::MetaError;
use crate::member::{EventCollection, EventDescriptor, PropertyCollection, PropertyDescriptor};
use crate::ty::{EditorRef, Type};

// -----------------------------------------------------------------------------
// TypeDescriptor

/// Metadata about a type or instance, as answered by a provider.
///
/// Every method has a default body describing "nothing", so custom
/// descriptors only implement what they know about. Collections are returned
/// through `Result` so a failing descriptor is reported instead of read as
/// empty.
pub trait TypeDescriptor: Send + Sync {
    /// Name used in error messages.
    fn descriptor_name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    fn attributes(&self) -> Result<AttributeCollection, MetaError> {
        Ok(AttributeCollection::empty())
    }

    fn properties(&self) -> Result<PropertyCollection, MetaError> {
        Ok(PropertyCollection::empty())
    }

    fn events(&self) -> Result<EventCollection, MetaError> {
        Ok(EventCollection::empty())
    }

    fn class_name(&self) -> Option<String> {
        None
    }

    fn component_name(&self) -> Option<String> {
        None
    }

    fn converter(&self) -> Option<Arc<dyn TypeConverter>> {
        None
    }

    fn default_property(&self) -> Option<PropertyDescriptor> {
        None
    }

    fn default_event(&self) -> Option<EventDescriptor> {
        None
    }

    /// The editor registered for the editor kind `kind`.
    fn editor(&self, _kind: TypeId) -> Option<EditorRef> {
        None
    }

    /// The object that owns values of `property`.
    ///
    /// Defaults to no owner; reflected descriptors answer with the instance
    /// they describe, proxies may redirect to another object.
    fn property_owner(&self, _property: Option<&PropertyDescriptor>) -> Option<Instance> {
        None
    }
}

/// A descriptor that describes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyDescriptor;

impl TypeDescriptor for EmptyDescriptor {}

// -----------------------------------------------------------------------------
// TypeConverter

/// Converts values of a type from and to other types.
///
/// Only capability queries are modeled here; concrete converters live with
/// their value types.
pub trait TypeConverter: Send + Sync + Debug {
    fn can_convert_from(&self, _source: &Type) -> bool {
        false
    }

    fn can_convert_to(&self, _target: &Type) -> bool {
        false
    }
}

/// The converter of types that declare none. Converts nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConverter;

impl TypeConverter for DefaultConverter {}
