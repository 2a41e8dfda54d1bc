use alloc::sync::Arc;

use super::{MetadataProvider, Next};
use crate::attribute::{AttributeCollection, AttributeRef};
use crate::component::Instance;
use crate::descriptor::TypeDescriptor;
use crate::error::MetaError;
use crate::member::{EventCollection, EventDescriptor, PropertyCollection, PropertyDescriptor};
use crate::ty::Type;

// -----------------------------------------------------------------------------
// ExternalHandler

/// Introspects foreign objects the type model cannot describe.
pub trait ExternalHandler: Send + Sync {
    fn class_name(&self, _instance: &Instance) -> Option<String> {
        None
    }

    fn component_name(&self, _instance: &Instance) -> Option<String> {
        None
    }

    fn attributes(&self, instance: &Instance) -> Result<Vec<AttributeRef>, MetaError>;

    fn properties(&self, instance: &Instance) -> Result<Vec<PropertyDescriptor>, MetaError>;

    fn events(&self, instance: &Instance) -> Result<Vec<EventDescriptor>, MetaError>;
}

// -----------------------------------------------------------------------------
// ExternalHandlerProvider

/// Answers for foreign instances through an [`ExternalHandler`].
///
/// Only supports [`Type::foreign`]; register it for that type. Queries
/// without an instance fall through to the rest of the chain.
pub struct ExternalHandlerProvider {
    handler: Arc<dyn ExternalHandler>,
}

impl ExternalHandlerProvider {
    pub fn new(handler: Arc<dyn ExternalHandler>) -> Self {
        Self { handler }
    }
}

impl MetadataProvider for ExternalHandlerProvider {
    fn provider_name(&self) -> &str {
        "ExternalHandlerProvider"
    }

    fn is_supported_type(&self, ty: &Type) -> bool {
        *ty == Type::foreign()
    }

    fn type_descriptor(
        &self,
        next: &Next<'_>,
        ty: &Type,
        instance: Option<&Instance>,
    ) -> Option<Arc<dyn TypeDescriptor>> {
        match instance {
            Some(instance) => Some(Arc::new(ExternalDescriptor {
                handler: self.handler.clone(),
                instance: instance.clone(),
            })),
            None => next.type_descriptor(ty, None),
        }
    }
}

struct ExternalDescriptor {
    handler: Arc<dyn ExternalHandler>,
    instance: Instance,
}

impl TypeDescriptor for ExternalDescriptor {
    fn descriptor_name(&self) -> &str {
        "ExternalDescriptor"
    }

    fn attributes(&self) -> Result<AttributeCollection, MetaError> {
        self.handler.attributes(&self.instance).map(AttributeCollection::new)
    }

    fn properties(&self) -> Result<PropertyCollection, MetaError> {
        self.handler.properties(&self.instance).map(PropertyCollection::new)
    }

    fn events(&self) -> Result<EventCollection, MetaError> {
        self.handler.events(&self.instance).map(EventCollection::new)
    }

    fn class_name(&self) -> Option<String> {
        self.handler.class_name(&self.instance)
    }

    fn component_name(&self) -> Option<String> {
        self.handler.component_name(&self.instance)
    }

    fn property_owner(&self, _property: Option<&PropertyDescriptor>) -> Option<Instance> {
        Some(self.instance.clone())
    }
}
