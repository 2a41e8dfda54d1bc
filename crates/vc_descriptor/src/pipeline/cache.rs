use alloc::sync::Arc;
use core::fmt;

use crate::attribute::AttributeRef;
use crate::member::{EventDescriptor, PropertyDescriptor};

use super::PipelineMember;

// -----------------------------------------------------------------------------
// PipelineStage

/// The cached stages of an instance query, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// The type-level collection the query started from.
    Initialize,
    /// The primary collection with extended members appended.
    Merge,
    /// The result of the site's filter service.
    Filter,
    /// The result of the caller's attribute filter.
    AttributeFilter,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Initialize => "initialize",
            Self::Merge => "merge",
            Self::Filter => "filter",
            Self::AttributeFilter => "attribute-filter",
        })
    }
}

// -----------------------------------------------------------------------------
// Entries

/// Output of the filter-service stage.
pub(crate) struct FilterEntry<M> {
    /// Address of the filter service that produced it.
    pub service: usize,
    pub version: u64,
    pub input: Arc<[M]>,
    pub output: Arc<[M]>,
}

/// Output of the attribute-filter stage.
pub(crate) struct AttributeFilterEntry<M> {
    /// The caller's filter, compared by length and element identity.
    pub filter: Vec<AttributeRef>,
    pub version: u64,
    pub input: Arc<[M]>,
    pub output: Arc<[M]>,
}

impl<M> AttributeFilterEntry<M> {
    pub fn same_filter(&self, filter: &[AttributeRef]) -> bool {
        self.filter.len() == filter.len()
            && self.filter.iter().zip(filter).all(|(a, b)| Arc::ptr_eq(a, b))
    }
}

// -----------------------------------------------------------------------------
// StageCache

/// Stage snapshots of one member kind.
pub(crate) struct StageCache<M> {
    pub initialize: Option<Arc<[M]>>,
    pub merge: Option<Arc<[M]>>,
    pub filter: Option<FilterEntry<M>>,
    pub attribute_filter: Option<AttributeFilterEntry<M>>,
}

impl<M> Default for StageCache<M> {
    fn default() -> Self {
        Self {
            initialize: None,
            merge: None,
            filter: None,
            attribute_filter: None,
        }
    }
}

impl<M: PipelineMember> StageCache<M> {
    /// Stores the initial collection.
    ///
    /// Returns the cached collection if it holds the same elements as `base`.
    /// Otherwise every later stage is dropped.
    pub fn initialize(&mut self, base: Arc<[M]>) -> Arc<[M]> {
        if let Some(previous) = &self.initialize
            && M::same_elements(previous, &base)
        {
            return previous.clone();
        }
        self.initialize = Some(base.clone());
        self.drop_after(PipelineStage::Initialize);
        base
    }

    /// Drops the entries of every stage after `stage`.
    pub fn drop_after(&mut self, stage: PipelineStage) {
        match stage {
            PipelineStage::Initialize => {
                self.merge = None;
                self.filter = None;
                self.attribute_filter = None;
            }
            PipelineStage::Merge => {
                self.filter = None;
                self.attribute_filter = None;
            }
            PipelineStage::Filter => self.attribute_filter = None,
            PipelineStage::AttributeFilter => {}
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.initialize.is_none()
            && self.merge.is_none()
            && self.filter.is_none()
            && self.attribute_filter.is_none()
    }
}

// -----------------------------------------------------------------------------
// InstanceCache

/// Per-instance stage snapshots of all three member kinds.
#[derive(Default)]
pub(crate) struct InstanceCache {
    pub attributes: StageCache<AttributeRef>,
    pub properties: StageCache<PropertyDescriptor>,
    pub events: StageCache<EventDescriptor>,
}

impl InstanceCache {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.properties.is_empty() && self.events.is_empty()
    }
}

// -----------------------------------------------------------------------------
// Tests
