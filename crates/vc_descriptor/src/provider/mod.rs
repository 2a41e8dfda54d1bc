//! Metadata providers and the chain cursor they forward through.
//!
//! ## Menu
//!
//! - [`MetadataProvider`]: a pluggable source of descriptors.
//! - [`Next`]: the rest of the chain, handed to every provider call.
//! - [`ReflectProvider`]: the terminal provider reading declared metadata.
//! - [`AttributeProvider`]: injects a fixed attribute set.
//! - [`ExternalHandlerProvider`]: adapts an [`ExternalHandler`] for foreign objects.
//!
//! Providers registered for the same type or instance stack up: the most
//! recently added one is asked first and may forward to the next one. Chains
//! of types without their own registrations delegate to the chain of their
//! base type, and every chain ends in the reflection provider.

// -----------------------------------------------------------------------------
// Modules

mod attribute;
mod external;
mod reflect;

// -----------------------------------------------------------------------------
// Exports

pub use attribute::AttributeProvider;
pub use external::{ExternalHandler, ExternalHandlerProvider};
pub use reflect::ReflectProvider;

// -----------------------------------------------------------------------------
// MetadataProvider

use alloc::sync::Arc;
use core::cell::RefCell;

use crate::component::{Instance, resolution_type};
use crate::descriptor::TypeDescriptor;
use crate::error::MetaError;
use crate::registry::MetadataRegistry;
use crate::ty::Type;

/// A source of type descriptors.
///
/// Every method receives the rest of the chain as `next`; the default bodies
/// forward to it. Returning `None` where the chain is expected to answer is
/// reported as [`MetaError::MissingResult`] naming the provider.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vc_descriptor::component::Instance;
/// use vc_descriptor::descriptor::{EmptyDescriptor, TypeDescriptor};
/// use vc_descriptor::provider::{MetadataProvider, Next};
/// use vc_descriptor::ty::Type;
///
/// /// Hides everything about the types it is registered for.
/// struct Opaque;
///
/// impl MetadataProvider for Opaque {
///     fn type_descriptor(
///         &self,
///         _next: &Next<'_>,
///         _ty: &Type,
///         _instance: Option<&Instance>,
///     ) -> Option<Arc<dyn TypeDescriptor>> {
///         Some(Arc::new(EmptyDescriptor))
///     }
/// }
/// ```
pub trait MetadataProvider: Send + Sync + 'static {
    /// Name used in diagnostics and error messages.
    fn provider_name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Unsupported providers are skipped while walking a chain for `ty`.
    fn is_supported_type(&self, _ty: &Type) -> bool {
        true
    }

    /// The primary descriptor of `ty`, optionally for a specific instance.
    fn type_descriptor(
        &self,
        next: &Next<'_>,
        ty: &Type,
        instance: Option<&Instance>,
    ) -> Option<Arc<dyn TypeDescriptor>> {
        next.type_descriptor(ty, instance)
    }

    /// Members contributed to `instance` by its surroundings.
    fn extended_descriptor(
        &self,
        next: &Next<'_>,
        instance: &Instance,
    ) -> Option<Arc<dyn TypeDescriptor>> {
        next.extended_descriptor(instance)
    }

    fn create_instance(&self, next: &Next<'_>, ty: &Type) -> Option<Instance> {
        next.create_instance(ty)
    }
}

// -----------------------------------------------------------------------------
// ChainLink

/// One resolved step of a provider chain.
#[derive(Clone)]
pub(crate) enum ChainLink {
    Provider(Arc<dyn MetadataProvider>),
    /// Continue with the chain currently registered for the type.
    Delegate(Type),
}

// -----------------------------------------------------------------------------
// Next

/// The first provider that answered `None`, deepest first.
#[derive(Default)]
pub(crate) struct Fault(RefCell<Option<(String, &'static str)>>);

impl Fault {
    fn record(&self, provider: &str, method: &'static str) {
        let mut slot = self.0.borrow_mut();
        if slot.is_none() {
            *slot = Some((provider.into(), method));
        }
    }

    pub(crate) fn into_error(self, queried: &'static str) -> MetaError {
        match self.0.into_inner() {
            Some((provider, method)) => MetaError::missing(provider, method),
            None => MetaError::missing("<empty chain>", queried),
        }
    }
}

/// The remainder of a provider chain.
///
/// Walking skips providers that do not support the queried type and follows
/// delegations to base type chains as they are registered at call time.
pub struct Next<'a> {
    registry: &'a MetadataRegistry,
    links: &'a [ChainLink],
    fault: &'a Fault,
}

type Step<'f, T> = dyn Fn(&dyn MetadataProvider, &Next<'_>) -> Option<T> + 'f;

impl<'a> Next<'a> {
    #[inline]
    pub(crate) fn new(registry: &'a MetadataRegistry, links: &'a [ChainLink], fault: &'a Fault) -> Self {
        Self {
            registry,
            links,
            fault,
        }
    }

    /// The registry the chain belongs to.
    #[inline]
    pub fn registry(&self) -> &'a MetadataRegistry {
        self.registry
    }

    pub fn type_descriptor(
        &self,
        ty: &Type,
        instance: Option<&Instance>,
    ) -> Option<Arc<dyn TypeDescriptor>> {
        self.walk(ty, "type_descriptor", &|provider, next| {
            provider.type_descriptor(next, ty, instance)
        })
    }

    pub fn extended_descriptor(&self, instance: &Instance) -> Option<Arc<dyn TypeDescriptor>> {
        self.walk(&resolution_type(instance), "extended_descriptor", &|provider, next| {
            provider.extended_descriptor(next, instance)
        })
    }

    pub fn create_instance(&self, ty: &Type) -> Option<Instance> {
        self.walk(ty, "create_instance", &|provider, next| {
            provider.create_instance(next, ty)
        })
    }

    fn walk<T>(&self, ty: &Type, method: &'static str, step: &Step<'_, T>) -> Option<T> {
        let mut links = self.links;
        while let Some((link, rest)) = links.split_first() {
            match link {
                ChainLink::Provider(provider) => {
                    if !provider.is_supported_type(ty) {
                        links = rest;
                        continue;
                    }
                    let next = Next::new(self.registry, rest, self.fault);
                    let out = step(&**provider, &next);
                    if out.is_none() {
                        self.fault.record(provider.provider_name(), method);
                    }
                    return out;
                }
                ChainLink::Delegate(ancestor) => {
                    let chain = self.registry.type_chain(ancestor);
                    return Next::new(self.registry, &chain, self.fault).walk(ty, method, step);
                }
            }
        }
        None
    }
}
