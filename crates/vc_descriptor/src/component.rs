//! Components and the services their site exposes.
//!
//! ## Menu
//!
//! - [`Component`]: an object whose metadata the registry resolves.
//! - [`Instance`]: a shared component handle. Identity is `Arc` identity.
//! - [`Site`]: the container binding of a component (name, design mode, services).
//! - [`FilterService`], [`DesignerHost`], [`ExtenderProvider`]: site services
//!   consulted by the pipeline.
//! - [`Subject`]: a query target, either a type or an instance.

use alloc::sync::Arc;

use indexmap::IndexMap;

use crate::attribute::{AttributeKey, AttributeRef};
use crate::descriptor::TypeDescriptor;
use crate::member::{EventDescriptor, PropertyDescriptor};
use crate::ty::Type;

// -----------------------------------------------------------------------------
// Component

/// A shared component handle.
pub type Instance = Arc<dyn Component>;

/// An object the registry can describe.
///
/// # Example
///
/// ```
/// use vc_descriptor::component::Component;
/// use vc_descriptor::ty::Type;
///
/// struct Label(Type);
///
/// impl Component for Label {
///     fn component_type(&self) -> Type {
///         self.0.clone()
///     }
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// The runtime type of the component.
    fn component_type(&self) -> Type;

    /// The site the component is placed in.
    fn site(&self) -> Option<Arc<dyn Site>> {
        None
    }

    /// A descriptor the component reports about itself.
    ///
    /// When present, it is the primary source of metadata unless the query
    /// asks to bypass it.
    fn custom_descriptor(&self) -> Option<&dyn TypeDescriptor> {
        None
    }

    /// Whether the component wraps a foreign object.
    ///
    /// Foreign components resolve as [`Type::foreign`] regardless of
    /// [`component_type`](Self::component_type).
    fn is_foreign(&self) -> bool {
        false
    }
}

/// The type used to resolve `instance`'s provider chain.
#[inline]
pub(crate) fn resolution_type(instance: &Instance) -> Type {
    if instance.is_foreign() {
        Type::foreign()
    } else {
        instance.component_type()
    }
}

// -----------------------------------------------------------------------------
// Site services

/// Binds a component to its container.
pub trait Site: Send + Sync {
    fn name(&self) -> Option<String> {
        None
    }

    fn design_mode(&self) -> bool {
        false
    }

    fn filter_service(&self) -> Option<Arc<dyn FilterService>> {
        None
    }

    fn designer_host(&self) -> Option<Arc<dyn DesignerHost>> {
        None
    }

    fn extender_providers(&self) -> Vec<Arc<dyn ExtenderProvider>> {
        Vec::new()
    }
}

/// Edits member lists of sited components before they are returned.
///
/// Each method receives the members keyed by name (or attribute kind), may add,
/// remove or replace entries, and returns whether the outcome may be cached.
pub trait FilterService: Send + Sync {
    fn filter_attributes(
        &self,
        _component: &Instance,
        _attributes: &mut IndexMap<AttributeKey, AttributeRef>,
    ) -> bool {
        true
    }

    fn filter_properties(
        &self,
        _component: &Instance,
        _properties: &mut IndexMap<String, PropertyDescriptor>,
    ) -> bool {
        true
    }

    fn filter_events(
        &self,
        _component: &Instance,
        _events: &mut IndexMap<String, EventDescriptor>,
    ) -> bool {
        true
    }
}

/// Maps a component to its design-time stand-in.
pub trait DesignerHost: Send + Sync {
    fn designer(&self, component: &Instance) -> Option<Instance>;
}

/// Contributes properties to other components on the same site.
pub trait ExtenderProvider: Send + Sync {
    fn can_extend(&self, component: &Instance) -> bool;

    /// The properties added to every component this provider extends.
    ///
    /// They are expected to carry an [`ExtenderProvided`] attribute.
    ///
    /// [`ExtenderProvided`]: crate::attribute::ExtenderProvided
    fn extender_properties(&self) -> Vec<PropertyDescriptor>;
}

// -----------------------------------------------------------------------------
// Subject

/// What a query or registration targets.
#[derive(Clone, Copy)]
pub enum Subject<'a> {
    Type(&'a Type),
    Instance(&'a Instance),
}

impl Subject<'_> {
    /// The type whose chain this subject resolves through.
    pub fn resolution_type(&self) -> Type {
        match self {
            Subject::Type(ty) => (*ty).clone(),
            Subject::Instance(instance) => resolution_type(instance),
        }
    }

    #[inline]
    pub fn instance(&self) -> Option<&Instance> {
        match self {
            Subject::Type(_) => None,
            Subject::Instance(instance) => Some(*instance),
        }
    }
}

impl<'a> From<&'a Type> for Subject<'a> {
    #[inline]
    fn from(ty: &'a Type) -> Self {
        Subject::Type(ty)
    }
}

impl<'a> From<&'a Instance> for Subject<'a> {
    #[inline]
    fn from(instance: &'a Instance) -> Self {
        Subject::Instance(instance)
    }
}
