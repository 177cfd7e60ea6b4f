/*!
# Append-only spatial index

R-trees from `rstar` are bulk-loaded per batch and kept as a short stack of levels,
largest first. A new batch becomes its own level. Adjacent levels are merged with a
fresh bulk load while the tail level is no larger than the incoming one, so small
levels behave like a binary counter.

Merging stops at a size ceiling: a level that would grow past it is left alone, and
the stack gains another level of roughly ceiling size instead. One commit therefore
re-packs at most `ceiling` entries, whatever the total.

Queries walk every level. The index never removes single entries; it only grows or is
cleared as a whole.
*/

use crate::types::{Point, WorldRect};
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};

/// Batches at least this large build their entries in parallel.
const PAR_ENTRY_MIN: usize = 16 * 1024;

/// Largest level a single commit will build by merging.
pub const MERGE_CEILING: usize = 64 * 1024;

/// A point-degenerate box plus its payload. Immutable once inserted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexEntry {
    pub point: Point,
    /// Position of the point in the full generated sequence.
    pub global_index: u32,
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[f32; 2]>;

    #[inline]
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.point.x, self.point.y])
    }
}

/// Build entries for `points`, numbering them from `first_global`.
pub fn entries_for(points: &[Point], first_global: usize) -> Vec<IndexEntry> {
    let make = |(i, p): (usize, &Point)| IndexEntry {
        point: *p,
        global_index: (first_global + i) as u32,
    };

    if points.len() >= PAR_ENTRY_MIN {
        points.par_iter().enumerate().map(make).collect()
    } else {
        points.iter().enumerate().map(make).collect()
    }
}

pub struct SpatialIndex {
    /// Sizes are non-increasing from front to back, unless a single batch exceeded the ceiling.
    levels: Vec<RTree<IndexEntry>>,
    len: usize,
    merge_ceiling: usize,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::with_merge_ceiling(MERGE_CEILING)
    }
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("len", &self.len)
            .field("levels", &self.level_sizes())
            .finish()
    }
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_merge_ceiling(merge_ceiling: usize) -> Self {
        Self {
            levels: Vec::new(),
            len: 0,
            merge_ceiling: merge_ceiling.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of R-tree levels currently held.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level_sizes(&self) -> Vec<usize> {
        self.levels.iter().map(RTree::size).collect()
    }

    /// Add `entries` to the index. Earlier content is kept.
    ///
    /// Returns the size of the level that was bulk-loaded. That is the batch itself
    /// plus whatever was merged into it, and never more than the merge ceiling unless
    /// the batch alone exceeds it.
    pub fn bulk_insert(&mut self, entries: Vec<IndexEntry>) -> usize {
        if entries.is_empty() {
            return 0;
        }

        self.len += entries.len();
        let mut pending = entries;

        // Fold the tail into the incoming run while it would otherwise be smaller.
        loop {
            match self.levels.last() {
                Some(tail)
                    if tail.size() <= pending.len()
                        && tail.size() + pending.len() <= self.merge_ceiling =>
                {
                    if let Some(tail) = self.levels.pop() {
                        pending.reserve(tail.size());
                        pending.extend(tail.iter().copied());
                    }
                }
                _ => break,
            }
        }

        let built = pending.len();
        self.levels.push(RTree::bulk_load(pending));
        built
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.levels.clear();
        self.len = 0;
    }

    /// Visit every entry whose point lies inside `rect` (inclusive bounds).
    pub fn for_each_in<F>(&self, rect: &WorldRect, mut visit: F)
    where
        F: FnMut(&IndexEntry),
    {
        let envelope = AABB::from_corners([rect.min_x, rect.min_y], [rect.max_x, rect.max_y]);
        for level in &self.levels {
            for entry in level.locate_in_envelope(&envelope) {
                visit(entry);
            }
        }
    }

    /// Entries whose point lies inside `rect`.
    pub fn query(&self, rect: &WorldRect) -> Vec<IndexEntry> {
        let mut out = Vec::new();
        self.for_each_in(rect, |e| out.push(*e));
        out
    }

    /// Append the positions inside `rect` to `out`; returns how many were added.
    pub fn query_points_into(&self, rect: &WorldRect, out: &mut Vec<Point>) -> usize {
        let before = out.len();
        self.for_each_in(rect, |e| out.push(e.point));
        out.len() - before
    }

    pub fn count_in(&self, rect: &WorldRect) -> usize {
        let mut n = 0;
        self.for_each_in(rect, |_| n += 1);
        n
    }

    /// Every entry, in unspecified order.
    pub fn query_all(&self) -> Vec<IndexEntry> {
        let mut out = Vec::with_capacity(self.len);
        for level in &self.levels {
            out.extend(level.iter().copied());
        }
        out
    }
}
