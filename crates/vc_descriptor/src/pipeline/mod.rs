//! The query pipeline: merge, filter and per-instance stage caches.
//!
//! ## Menu
//!
//! - [`Query`]: the builder returned by
//!   [`MetadataRegistry::query`](crate::registry::MetadataRegistry::query).
//! - [`merge`]: appends extended members to a primary collection.
//! - [`PipelineStage`]: the cached stages of an instance query.
//!
//! An instance query runs these stages, each cached per instance and member
//! kind:
//!
//! 1. **Initialize**: the type-level collection. When its elements change,
//!    every later stage is dropped.
//! 2. **Merge**: extended members appended. Skipped when there are none.
//! 3. **Filter**: the site's filter service, keyed by service identity and
//!    metadata version.
//! 4. **AttributeFilter**: the caller's attribute filter, keyed by the filter
//!    elements and metadata version.
//!
//! Components reporting a custom descriptor skip the first stage: their own
//! report is the primary collection and the type-level one is merged behind it.
//! Type queries are not cached and only run the attribute filter.

// -----------------------------------------------------------------------------
// Modules

mod cache;
mod filter;
mod merge;
mod query;

// -----------------------------------------------------------------------------
// Exports

pub use cache::PipelineStage;
pub use merge::merge;
pub use query::Query;

pub(crate) use cache::InstanceCache;

// -----------------------------------------------------------------------------
// Tracing

/// Stage-level trace logging, only with the `debug` feature in debug builds.
macro_rules! stage_trace {
    ($($arg:tt)*) => {
        #[cfg(all(debug_assertions, feature = "debug"))]
        log::trace!($($arg)*);
    };
}

pub(crate) use stage_trace;

// -----------------------------------------------------------------------------
// PipelineMember

use alloc::sync::Arc;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::attribute::{AttributeCollection, AttributeRef};
use crate::component::{FilterService, Instance, Subject};
use crate::descriptor::TypeDescriptor;
use crate::error::MetaError;
use crate::member::{EventDescriptor, Member, PropertyDescriptor};
use crate::registry::MetadataRegistry;

use cache::StageCache;

/// A member kind flowing through the pipeline.
pub(crate) trait PipelineMember: Clone + Send + Sync + 'static {
    /// Identity comparison.
    fn same(&self, other: &Self) -> bool;

    fn same_elements(a: &[Self], b: &[Self]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same(y))
    }

    /// Whether the caller's attribute filter hides this member.
    fn hidden_by(&self, filter: &[AttributeRef]) -> bool;

    fn collect(descriptor: &dyn TypeDescriptor) -> Result<Arc<[Self]>, MetaError>;

    /// Runs the filter service, returning the new list and whether it may be cached.
    fn filter_with(
        service: &dyn FilterService,
        instance: &Instance,
        items: &[Self],
        registry: &MetadataRegistry,
    ) -> (Vec<Self>, bool);

    fn stage(cache: &mut InstanceCache) -> &mut StageCache<Self>;
}

impl PipelineMember for AttributeRef {
    #[inline]
    fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }

    /// Attribute filters select members, never attributes.
    #[inline]
    fn hidden_by(&self, _filter: &[AttributeRef]) -> bool {
        false
    }

    fn collect(descriptor: &dyn TypeDescriptor) -> Result<Arc<[Self]>, MetaError> {
        Ok(descriptor.attributes()?.shared().clone())
    }

    fn filter_with(
        service: &dyn FilterService,
        instance: &Instance,
        items: &[Self],
        _registry: &MetadataRegistry,
    ) -> (Vec<Self>, bool) {
        let mut map = filter::keyed_by_kind(items);
        let cacheable = service.filter_attributes(instance, &mut map);
        (map.into_values().collect(), cacheable)
    }

    #[inline]
    fn stage(cache: &mut InstanceCache) -> &mut StageCache<Self> {
        &mut cache.attributes
    }
}

impl PipelineMember for PropertyDescriptor {
    #[inline]
    fn same(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }

    fn hidden_by(&self, filter: &[AttributeRef]) -> bool {
        filter::should_hide(self.attributes(), filter)
    }

    fn collect(descriptor: &dyn TypeDescriptor) -> Result<Arc<[Self]>, MetaError> {
        Ok(descriptor.properties()?.shared().clone())
    }

    fn filter_with(
        service: &dyn FilterService,
        instance: &Instance,
        items: &[Self],
        registry: &MetadataRegistry,
    ) -> (Vec<Self>, bool) {
        let mut map = filter::keyed_by_name(items, registry, |p| {
            p.extender_name().map(str::to_owned)
        });
        let cacheable = service.filter_properties(instance, &mut map);
        (map.into_values().collect(), cacheable)
    }

    #[inline]
    fn stage(cache: &mut InstanceCache) -> &mut StageCache<Self> {
        &mut cache.properties
    }
}

impl PipelineMember for EventDescriptor {
    #[inline]
    fn same(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }

    fn hidden_by(&self, filter: &[AttributeRef]) -> bool {
        filter::should_hide(self.attributes(), filter)
    }

    fn collect(descriptor: &dyn TypeDescriptor) -> Result<Arc<[Self]>, MetaError> {
        Ok(descriptor.events()?.shared().clone())
    }

    fn filter_with(
        service: &dyn FilterService,
        instance: &Instance,
        items: &[Self],
        registry: &MetadataRegistry,
    ) -> (Vec<Self>, bool) {
        let mut map = filter::keyed_by_name(items, registry, |_| None);
        let cacheable = service.filter_events(instance, &mut map);
        (map.into_values().collect(), cacheable)
    }

    #[inline]
    fn stage(cache: &mut InstanceCache) -> &mut StageCache<Self> {
        &mut cache.events
    }
}

// -----------------------------------------------------------------------------
// Running a query

#[inline]
pub(crate) fn lock(cache: &Mutex<InstanceCache>) -> MutexGuard<'_, InstanceCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs the pipeline for `subject`.
pub(crate) fn run<M: PipelineMember>(
    registry: &MetadataRegistry,
    subject: Subject<'_>,
    filter: &[AttributeRef],
    no_custom_descriptor: bool,
) -> Result<Arc<[M]>, MetaError> {
    match subject {
        Subject::Type(_) => {
            let descriptor = registry.type_descriptor(subject)?;
            let members = M::collect(&*descriptor)?;
            Ok(filter::apply_attribute_filter(&members, filter))
        }
        Subject::Instance(instance) => run_instance(registry, instance, filter, no_custom_descriptor),
    }
}

fn run_instance<M: PipelineMember>(
    registry: &MetadataRegistry,
    instance: &Instance,
    filter: &[AttributeRef],
    no_custom_descriptor: bool,
) -> Result<Arc<[M]>, MetaError> {
    let cache = registry.instance_cache(instance);
    let subject = Subject::Instance(instance);

    let custom = if no_custom_descriptor {
        None
    } else {
        instance.custom_descriptor()
    };
    let mut current = match custom {
        Some(custom) => {
            let primary = M::collect(custom)?;
            let reflected = M::collect(&*registry.type_descriptor(subject)?)?;
            let reflected = M::stage(&mut lock(&cache)).initialize(reflected);
            let mut secondary = reflected.to_vec();
            secondary.extend(M::collect(&*registry.extended_descriptor(instance)?)?.iter().cloned());
            merge::merge_stage(&cache, primary, &secondary)
        }
        None => {
            let base = M::collect(&*registry.type_descriptor(subject)?)?;
            let base = M::stage(&mut lock(&cache)).initialize(base);
            let extended = M::collect(&*registry.extended_descriptor(instance)?)?;
            merge::merge_stage(&cache, base, &extended)
        }
    };

    if let Some(service) = instance.site().and_then(|site| site.filter_service()) {
        current = filter::service_stage(registry, &cache, instance, &service, current);
    }
    if !filter.is_empty() {
        current = filter::attribute_stage(registry, &cache, filter, current);
    }
    Ok(current)
}

/// Wraps pipeline output into attribute collections.
#[inline]
pub(crate) fn into_attributes(shared: Arc<[AttributeRef]>) -> AttributeCollection {
    AttributeCollection::from_shared(shared)
}
