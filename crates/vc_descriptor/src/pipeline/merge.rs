use alloc::sync::Arc;
use std::sync::Mutex;

use super::cache::{InstanceCache, PipelineStage};
use super::{PipelineMember, lock, stage_trace};

// -----------------------------------------------------------------------------
// merge

/// Appends `secondary` after `primary` without removing duplicates.
///
/// Returns `primary` itself, sharing its allocation, when `secondary` is empty.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vc_descriptor::pipeline::merge;
///
/// let primary: Arc<[u8]> = Arc::from(vec![1, 2]);
/// assert_eq!(&*merge(&primary, &[3]), &[1, 2, 3]);
/// assert!(Arc::ptr_eq(&merge(&primary, &[]), &primary));
/// ```
pub fn merge<M: Clone>(primary: &Arc<[M]>, secondary: &[M]) -> Arc<[M]> {
    if secondary.is_empty() {
        return primary.clone();
    }
    primary.iter().chain(secondary).cloned().collect()
}

/// Returns `true` if `merged` holds exactly `primary` then `secondary`, by identity.
fn is_concat<M: PipelineMember>(merged: &[M], primary: &[M], secondary: &[M]) -> bool {
    merged.len() == primary.len() + secondary.len()
        && M::same_elements(&merged[..primary.len()], primary)
        && M::same_elements(&merged[primary.len()..], secondary)
}

/// The Merge stage: reuses the cached merge while its elements are unchanged.
pub(super) fn merge_stage<M: PipelineMember>(
    cache: &Mutex<InstanceCache>,
    primary: Arc<[M]>,
    secondary: &[M],
) -> Arc<[M]> {
    if secondary.is_empty() {
        return primary;
    }

    let mut guard = lock(cache);
    let stage = M::stage(&mut guard);
    if let Some(previous) = &stage.merge
        && is_concat(previous, &primary, secondary)
    {
        stage_trace!("{}: cached merge of {} members", PipelineStage::Merge, previous.len());
        return previous.clone();
    }

    let merged = merge(&primary, secondary);
    stage.merge = Some(merged.clone());
    stage.drop_after(PipelineStage::Merge);
    merged
}

// -----------------------------------------------------------------------------
// Tests
