//! Memory ranking and retention policy.
//!
//! The live memory log is unbounded; everything downstream (digests,
//! summarized saves, context windows) works on a bounded retained view.
//! The view is a list of arena indices, so the arena itself is never edited.
//!
//! Ranking key, highest first:
//!
//! ```text
//! (kind weight desc, created_at desc, insertion order asc)
//!   Promise=4  Relationship=3  Achievement=2  Lesson=2  General=1
//! ```
//!
//! The sort is stable and the key is total, so identical input always
//! yields an identical view. Because weight is the primary key, every
//! Promise sorts ahead of every other kind: if there are at most `cap`
//! Promises, all of them are retained.

use std::cmp::Ordering;

use tracing::debug;

use crate::types::{MemoryKind, MemoryRecord};

/// Result of a retention pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetainedView {
    /// Arena indices of retained memories, best ranked first.
    pub indices: Vec<usize>,
    /// Memories left out of the view.
    pub discarded_count: usize,
}

impl RetainedView {
    /// Number of retained memories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether nothing was retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Resolve the view against the arena it was computed from.
    pub fn records<'a>(&'a self, memories: &'a [MemoryRecord]) -> impl Iterator<Item = &'a MemoryRecord> + 'a {
        self.indices.iter().filter_map(move |&i| memories.get(i))
    }
}

/// Ranking order between two memories. `Less` means "keep first".
fn rank_order(a: &MemoryRecord, b: &MemoryRecord) -> Ordering {
    b.kind
        .weight()
        .cmp(&a.kind.weight())
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Rank `memories` and keep the best `cap`.
///
/// Never fails; an empty input or a zero cap yields an empty view.
#[must_use]
pub fn retain(memories: &[MemoryRecord], cap: usize) -> RetainedView {
    let mut indices: Vec<usize> = (0..memories.len()).collect();
    // `sort_by` is stable: equal keys keep ascending insertion order.
    indices.sort_by(|&a, &b| rank_order(&memories[a], &memories[b]));

    let discarded_count = indices.len().saturating_sub(cap);
    indices.truncate(cap);

    if discarded_count > 0 {
        debug!(
            total = memories.len(),
            retained = indices.len(),
            discarded = discarded_count,
            "Retention pass discarded memories"
        );
    }

    RetainedView {
        indices,
        discarded_count,
    }
}

/// The best `limit` memories of one kind, in ranking order.
#[must_use]
pub fn top_of_kind<'a, I>(memories: I, kind: MemoryKind, limit: usize) -> Vec<&'a MemoryRecord>
where
    I: IntoIterator<Item = &'a MemoryRecord>,
{
    let mut matching: Vec<&MemoryRecord> = memories.into_iter().filter(|m| m.kind == kind).collect();
    matching.sort_by(|a, b| rank_order(a, b));
    matching.truncate(limit);
    matching
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
