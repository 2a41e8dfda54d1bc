use alloc::sync::Arc;
use core::any::TypeId;

use crate::attribute::{AttributeCollection, AttributeRef};
use crate::component::{Instance, Subject};
use crate::descriptor::{TypeConverter, TypeDescriptor};
use crate::error::MetaError;
use crate::member::{EventCollection, EventDescriptor, PropertyCollection, PropertyDescriptor};
use crate::registry::MetadataRegistry;
use crate::ty::EditorRef;

use super::{PipelineMember, into_attributes, run};

// -----------------------------------------------------------------------------
// Query

/// A metadata query against one type or instance.
///
/// Created by [`MetadataRegistry::query`].
///
/// Filter results are cached per instance by the identity of the filter
/// elements, so callers repeating a query should reuse the same
/// [`AttributeRef`]s.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vc_descriptor::attribute::{AttributeRef, Browsable};
/// use vc_descriptor::registry::MetadataRegistry;
/// use vc_descriptor::ty::{PropertyDecl, Type};
///
/// let text = Type::builder("Text").build().unwrap();
/// let ty = Type::builder("Panel")
///     .property(PropertyDecl::new("Visible", &text))
///     .property(PropertyDecl::new("Handle", &text).attribute(Browsable(false)))
///     .build()
///     .unwrap();
///
/// let registry = MetadataRegistry::new();
/// let browsable: AttributeRef = Arc::new(Browsable(true));
/// let props = registry.query(&ty).filter(&[browsable]).properties().unwrap();
///
/// assert_eq!(props.len(), 1);
/// assert_eq!(props[0].name(), "Visible");
/// ```
pub struct Query<'a> {
    registry: &'a MetadataRegistry,
    subject: Subject<'a>,
    filter: Vec<AttributeRef>,
    no_custom_descriptor: bool,
}

impl<'a> Query<'a> {
    #[inline]
    pub(crate) fn new(registry: &'a MetadataRegistry, subject: Subject<'a>) -> Self {
        Self {
            registry,
            subject,
            filter: Vec::new(),
            no_custom_descriptor: false,
        }
    }

    /// Keeps only members matching every attribute in `filter`.
    ///
    /// Does not apply to [`attributes`](Self::attributes).
    pub fn filter(mut self, filter: &[AttributeRef]) -> Self {
        self.filter = filter.to_vec();
        self
    }

    /// Ignores the descriptor an instance reports about itself.
    pub fn no_custom_descriptor(mut self) -> Self {
        self.no_custom_descriptor = true;
        self
    }

    pub fn attributes(&self) -> Result<AttributeCollection, MetaError> {
        self.members().map(into_attributes)
    }

    pub fn properties(&self) -> Result<PropertyCollection, MetaError> {
        self.members().map(PropertyCollection::from_shared)
    }

    pub fn events(&self) -> Result<EventCollection, MetaError> {
        self.members().map(EventCollection::from_shared)
    }

    /// The converter of the subject.
    ///
    /// If no descriptor answers, the type-level descriptor is reported as
    /// [`MetaError::MissingResult`].
    pub fn converter(&self) -> Result<Arc<dyn TypeConverter>, MetaError> {
        if let Some(converter) = self.custom_descriptor().and_then(|d| d.converter()) {
            return Ok(converter);
        }
        let descriptor = self.registry.type_descriptor(self.subject)?;
        descriptor
            .converter()
            .ok_or_else(|| MetaError::missing(descriptor.descriptor_name(), "converter"))
    }

    /// The editor registered for the editor kind `K`.
    pub fn editor<K: ?Sized + 'static>(&self) -> Result<Option<EditorRef>, MetaError> {
        self.with_descriptor(|d| d.editor(TypeId::of::<K>()))
    }

    pub fn class_name(&self) -> Result<Option<String>, MetaError> {
        self.with_descriptor(|d| d.class_name())
    }

    pub fn component_name(&self) -> Result<Option<String>, MetaError> {
        self.with_descriptor(|d| d.component_name())
    }

    pub fn default_property(&self) -> Result<Option<PropertyDescriptor>, MetaError> {
        self.with_descriptor(|d| d.default_property())
    }

    pub fn default_event(&self) -> Result<Option<EventDescriptor>, MetaError> {
        self.with_descriptor(|d| d.default_event())
    }

    /// The object owning values of `property`, usually the instance itself.
    pub fn property_owner(
        &self,
        property: Option<&PropertyDescriptor>,
    ) -> Result<Option<Instance>, MetaError> {
        self.with_descriptor(|d| d.property_owner(property))
    }

    // -------------------------------------------------------------------------
    // Internals

    fn members<M: PipelineMember>(&self) -> Result<Arc<[M]>, MetaError> {
        run(self.registry, self.subject, &self.filter, self.no_custom_descriptor)
    }

    /// The descriptor an instance reports about itself, unless bypassed.
    fn custom_descriptor(&self) -> Option<&'a dyn TypeDescriptor> {
        match self.subject {
            Subject::Instance(instance) if !self.no_custom_descriptor => instance.custom_descriptor(),
            _ => None,
        }
    }

    /// Asks the custom descriptor first and the type-level one when it has
    /// no answer.
    fn with_descriptor<R>(
        &self,
        f: impl Fn(&dyn TypeDescriptor) -> Option<R>,
    ) -> Result<Option<R>, MetaError> {
        if let Some(answer) = self.custom_descriptor().and_then(|custom| f(custom)) {
            return Ok(Some(answer));
        }
        let descriptor = self.registry.type_descriptor(self.subject)?;
        Ok(f(&*descriptor))
    }
}
