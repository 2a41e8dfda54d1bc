use alloc::sync::Arc;
use std::sync::Mutex;

use indexmap::IndexMap;

use super::cache::{AttributeFilterEntry, FilterEntry, InstanceCache, PipelineStage};
use super::{PipelineMember, lock, stage_trace};
use crate::attribute::{AttributeCollection, AttributeKey, AttributeRef};
use crate::component::{FilterService, Instance};
use crate::member::Member;
use crate::registry::MetadataRegistry;

// -----------------------------------------------------------------------------
// Keyed maps handed to filter services

/// Attributes keyed by kind. A later attribute replaces an earlier one in place.
pub(super) fn keyed_by_kind(items: &[AttributeRef]) -> IndexMap<AttributeKey, AttributeRef> {
    let mut map = IndexMap::with_capacity(items.len());
    for attr in items {
        map.insert(attr.key(), attr.clone());
    }
    map
}

/// Members keyed by name.
///
/// The first member of a name keeps the plain key. Later ones get
/// `{name}_{suffix}`, where the suffix comes from `suffix` or, failing that,
/// from the registry-wide collision counter. A key that is still taken gets
/// a counter appended until it is free, so no member is ever replaced.
pub(super) fn keyed_by_name<M: Member>(
    items: &[M],
    registry: &MetadataRegistry,
    suffix: impl Fn(&M) -> Option<String>,
) -> IndexMap<String, M> {
    let mut map = IndexMap::with_capacity(items.len());
    for item in items {
        let name = item.member().name();
        let mut key = name.to_owned();
        if map.contains_key(&key) {
            let suffix = suffix(item).unwrap_or_else(|| registry.next_collision_index().to_string());
            key = format!("{name}_{suffix}");
            let mut counter = 1_u32;
            while map.contains_key(&key) {
                key = format!("{name}_{suffix}_{counter}");
                counter += 1;
            }
        }
        map.insert(key, item.clone());
    }
    map
}

// -----------------------------------------------------------------------------
// Filter-service stage

/// The Filter stage, cached by service identity, metadata version and input.
///
/// Only results the service reports as cacheable are stored.
pub(super) fn service_stage<M: PipelineMember>(
    registry: &MetadataRegistry,
    cache: &Mutex<InstanceCache>,
    instance: &Instance,
    service: &Arc<dyn FilterService>,
    input: Arc<[M]>,
) -> Arc<[M]> {
    let address = Arc::as_ptr(service).cast::<()>() as usize;
    let version = registry.metadata_version();

    if let Some(entry) = &M::stage(&mut lock(cache)).filter
        && entry.service == address
        && entry.version == version
        && Arc::ptr_eq(&entry.input, &input)
    {
        stage_trace!("{}: cache hit", PipelineStage::Filter);
        return entry.output.clone();
    }

    // The service runs without holding the cache lock.
    let (filtered, cacheable) = M::filter_with(&**service, instance, &input, registry);
    let output: Arc<[M]> = if M::same_elements(&input, &filtered) {
        input.clone()
    } else {
        filtered.into()
    };

    let mut guard = lock(cache);
    let stage = M::stage(&mut guard);
    stage.filter = cacheable.then(|| FilterEntry {
        service: address,
        version,
        input,
        output: output.clone(),
    });
    stage.drop_after(PipelineStage::Filter);
    output
}

// -----------------------------------------------------------------------------
// Attribute-filter stage

/// Returns `true` if a member with `attributes` fails the caller's `filter`.
///
/// A requested attribute hides the member when the member has one of the same
/// kind that the request does not match, or has none and the requested value
/// is not the implicit default.
pub(crate) fn should_hide(attributes: &AttributeCollection, filter: &[AttributeRef]) -> bool {
    filter
        .iter()
        .any(|requested| match attributes.get(requested.key()) {
            Some(found) => !requested.matches(&**found),
            None => !requested.is_default_attribute(),
        })
}

/// Removes hidden members, returning `input` itself if none is hidden.
pub(super) fn apply_attribute_filter<M: PipelineMember>(
    input: &Arc<[M]>,
    filter: &[AttributeRef],
) -> Arc<[M]> {
    if filter.is_empty() || !input.iter().any(|m| m.hidden_by(filter)) {
        return input.clone();
    }
    input.iter().filter(|m| !m.hidden_by(filter)).cloned().collect()
}

/// The AttributeFilter stage, cached by filter elements, metadata version and input.
pub(super) fn attribute_stage<M: PipelineMember>(
    registry: &MetadataRegistry,
    cache: &Mutex<InstanceCache>,
    filter: &[AttributeRef],
    input: Arc<[M]>,
) -> Arc<[M]> {
    let version = registry.metadata_version();

    if let Some(entry) = &M::stage(&mut lock(cache)).attribute_filter
        && entry.version == version
        && entry.same_filter(filter)
        && Arc::ptr_eq(&entry.input, &input)
    {
        stage_trace!("{}: cache hit", PipelineStage::AttributeFilter);
        return entry.output.clone();
    }

    let output = apply_attribute_filter(&input, filter);
    M::stage(&mut lock(cache)).attribute_filter = Some(AttributeFilterEntry {
        filter: filter.to_vec(),
        version,
        input,
        output: output.clone(),
    });
    output
}

// -----------------------------------------------------------------------------
// Tests
