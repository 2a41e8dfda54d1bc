use alloc::sync::Arc;
use core::any::TypeId;

use super::{MetadataProvider, Next};
use crate::attribute::{AttributeCollection, AttributeRef};
use crate::component::Instance;
use crate::descriptor::{TypeConverter, TypeDescriptor};
use crate::error::MetaError;
use crate::member::{EventCollection, EventDescriptor, PropertyCollection, PropertyDescriptor};
use crate::ty::{EditorRef, Type};

// -----------------------------------------------------------------------------
// AttributeProvider

/// Adds a fixed set of type-level attributes to whatever the rest of the
/// chain answers.
///
/// Added attributes override forwarded ones of the same kind.
/// Created by [`MetadataRegistry::add_attributes`](crate::registry::MetadataRegistry::add_attributes).
pub struct AttributeProvider {
    attributes: Arc<[AttributeRef]>,
}

impl AttributeProvider {
    /// Fails if `attributes` is empty.
    pub fn new(attributes: Vec<AttributeRef>) -> Result<Self, MetaError> {
        if attributes.is_empty() {
            return Err(MetaError::invalid("attributes", "at least one attribute is required"));
        }
        Ok(Self {
            attributes: attributes.into(),
        })
    }
}

impl MetadataProvider for AttributeProvider {
    fn provider_name(&self) -> &str {
        "AttributeProvider"
    }

    fn type_descriptor(
        &self,
        next: &Next<'_>,
        ty: &Type,
        instance: Option<&Instance>,
    ) -> Option<Arc<dyn TypeDescriptor>> {
        let inner = next.type_descriptor(ty, instance)?;
        Some(Arc::new(AugmentedDescriptor {
            inner,
            extra: self.attributes.clone(),
        }))
    }
}

/// Forwards everything to `inner` except `attributes`.
struct AugmentedDescriptor {
    inner: Arc<dyn TypeDescriptor>,
    extra: Arc<[AttributeRef]>,
}

impl TypeDescriptor for AugmentedDescriptor {
    fn descriptor_name(&self) -> &str {
        self.inner.descriptor_name()
    }

    fn attributes(&self) -> Result<AttributeCollection, MetaError> {
        Ok(self.inner.attributes()?.with_overrides(&self.extra))
    }

    fn properties(&self) -> Result<PropertyCollection, MetaError> {
        self.inner.properties()
    }

    fn events(&self) -> Result<EventCollection, MetaError> {
        self.inner.events()
    }

    fn class_name(&self) -> Option<String> {
        self.inner.class_name()
    }

    fn component_name(&self) -> Option<String> {
        self.inner.component_name()
    }

    fn converter(&self) -> Option<Arc<dyn TypeConverter>> {
        self.inner.converter()
    }

    fn default_property(&self) -> Option<PropertyDescriptor> {
        self.inner.default_property()
    }

    fn default_event(&self) -> Option<EventDescriptor> {
        self.inner.default_event()
    }

    fn editor(&self, kind: TypeId) -> Option<EditorRef> {
        self.inner.editor(kind)
    }

    fn property_owner(&self, property: Option<&PropertyDescriptor>) -> Option<Instance> {
        self.inner.property_owner(property)
    }
}
