//! A single bounded priority queue parameterized by which end of the
//! ordering sits at the root.
//!
//! Every item is admitted with a `rank: f32` where, regardless of the
//! metric in play, **smaller rank always means better** — see
//! [`crate::distance::Metric::rank`]. That lets one heap type serve both
//! roles the HNSW core needs instead of a `BoundedMinHeap`/`BoundedMaxHeap`
//! pair keyed on raw, metric-specific distances:
//!
//! - [`HeapMode::BetterTop`]: the root is the best admitted item (used for
//!   the candidate frontier `C` and the final result heap `R`).
//! - [`HeapMode::WorstTop`]: the root is the worst *retained* item (used for
//!   the capped result set `W` during a layer search, so a new candidate can
//!   be compared against the current worst in O(1)).

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapMode {
    BetterTop,
    WorstTop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HeapError {
    #[error("heap is empty")]
    Empty,
    #[error("heap is at capacity")]
    Full,
}

struct Ranked<T> {
    rank: f32,
    item: T,
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rank.total_cmp(&other.rank) == Ordering::Equal
    }
}
impl<T> Eq for Ranked<T> {}
impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for Ranked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank.total_cmp(&other.rank)
    }
}

enum Inner<T> {
    /// Root = smallest rank = best.
    BetterTop(BinaryHeap<Reverse<Ranked<T>>>),
    /// Root = largest rank = worst retained.
    WorstTop(BinaryHeap<Ranked<T>>),
}

/// A bounded (or unbounded) priority queue; see module docs for the two
/// ordering modes.
pub struct BoundedHeap<T> {
    inner: Inner<T>,
    capacity: Option<usize>,
}

impl<T> BoundedHeap<T> {
    pub fn new(mode: HeapMode, capacity: Option<usize>) -> Self {
        let inner = match mode {
            HeapMode::BetterTop => Inner::BetterTop(BinaryHeap::new()),
            HeapMode::WorstTop => Inner::WorstTop(BinaryHeap::new()),
        };
        Self { inner, capacity }
    }

    pub fn mode(&self) -> HeapMode {
        match self.inner {
            Inner::BetterTop(_) => HeapMode::BetterTop,
            Inner::WorstTop(_) => HeapMode::WorstTop,
        }
    }

    pub fn len(&self) -> usize {
        match &self.inner {
            Inner::BetterTop(h) => h.len(),
            Inner::WorstTop(h) => h.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        matches!(self.capacity, Some(c) if self.len() >= c)
    }

    /// Unconditional insert. Errs with [`HeapError::Full`] if bounded and at
    /// capacity; callers that want eviction semantics should use
    /// [`Self::insert_or_replace_if_better`].
    pub fn insert(&mut self, rank: f32, item: T) -> Result<(), HeapError> {
        if self.is_full() {
            return Err(HeapError::Full);
        }
        match &mut self.inner {
            Inner::BetterTop(h) => h.push(Reverse(Ranked { rank, item })),
            Inner::WorstTop(h) => h.push(Ranked { rank, item }),
        }
        Ok(())
    }

    /// If unbounded or not yet full, insert unconditionally. If full, replace
    /// the root only when `rank` is strictly better (smaller) than the
    /// root's rank. Never errors; returns whether the item was admitted.
    pub fn insert_or_replace_if_better(&mut self, rank: f32, item: T) -> bool {
        if !self.is_full() {
            let _ = self.insert(rank, item);
            return true;
        }
        let root_rank = match self.peek() {
            Some((r, _)) => r,
            None => return false,
        };
        if rank < root_rank {
            let _ = self.replace_root(rank, item);
            true
        } else {
            false
        }
    }

    pub fn peek(&self) -> Option<(f32, &T)> {
        match &self.inner {
            Inner::BetterTop(h) => h.peek().map(|Reverse(r)| (r.rank, &r.item)),
            Inner::WorstTop(h) => h.peek().map(|r| (r.rank, &r.item)),
        }
    }

    pub fn pop(&mut self) -> Option<(f32, T)> {
        match &mut self.inner {
            Inner::BetterTop(h) => h.pop().map(|Reverse(r)| (r.rank, r.item)),
            Inner::WorstTop(h) => h.pop().map(|r| (r.rank, r.item)),
        }
    }

    /// Pop the current root and push a replacement, returning the old root.
    pub fn replace_root(&mut self, rank: f32, item: T) -> Result<(f32, T), HeapError> {
        let old = self.pop().ok_or(HeapError::Empty)?;
        match &mut self.inner {
            Inner::BetterTop(h) => h.push(Reverse(Ranked { rank, item })),
            Inner::WorstTop(h) => h.push(Ranked { rank, item }),
        }
        Ok(old)
    }

    pub fn clear(&mut self) {
        match &mut self.inner {
            Inner::BetterTop(h) => h.clear(),
            Inner::WorstTop(h) => h.clear(),
        }
    }

    /// Drain into a `(rank, item)` vector ordered best-to-worst, regardless
    /// of this heap's mode.
    pub fn into_sorted_vec(self) -> Vec<(f32, T)> {
        let mut out: Vec<(f32, T)> = match self.inner {
            Inner::BetterTop(h) => h.into_iter().map(|Reverse(r)| (r.rank, r.item)).collect(),
            Inner::WorstTop(h) => h.into_iter().map(|r| (r.rank, r.item)).collect(),
        };
        out.sort_by(|a, b| a.0.total_cmp(&b.0));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn better_top_pops_smallest_rank_first() {
        let mut h = BoundedHeap::new(HeapMode::BetterTop, None);
        h.insert(3.0, "c").unwrap();
        h.insert(1.0, "a").unwrap();
        h.insert(2.0, "b").unwrap();
        assert_eq!(h.pop(), Some((1.0, "a")));
        assert_eq!(h.pop(), Some((2.0, "b")));
        assert_eq!(h.pop(), Some((3.0, "c")));
    }

    #[test]
    fn worst_top_pops_largest_rank_first() {
        let mut h = BoundedHeap::new(HeapMode::WorstTop, None);
        h.insert(3.0, "c").unwrap();
        h.insert(1.0, "a").unwrap();
        h.insert(2.0, "b").unwrap();
        assert_eq!(h.pop(), Some((3.0, "c")));
        assert_eq!(h.pop(), Some((2.0, "b")));
        assert_eq!(h.pop(), Some((1.0, "a")));
    }

    #[test]
    fn worst_top_bounded_evicts_worst_on_better_insert() {
        let mut h = BoundedHeap::new(HeapMode::WorstTop, Some(2));
        assert!(h.insert_or_replace_if_better(5.0, "five"));
        assert!(h.insert_or_replace_if_better(3.0, "three"));
        // heap full at {5,3}; 1.0 is better than the worst retained (5.0)
        assert!(h.insert_or_replace_if_better(1.0, "one"));
        assert_eq!(h.len(), 2);
        let sorted = h.into_sorted_vec();
        assert_eq!(sorted, vec![(1.0, "one"), (3.0, "three")]);
    }

    #[test]
    fn worst_top_bounded_rejects_worse_than_root() {
        let mut h = BoundedHeap::new(HeapMode::WorstTop, Some(2));
        h.insert_or_replace_if_better(1.0, "one");
        h.insert_or_replace_if_better(2.0, "two");
        assert!(!h.insert_or_replace_if_better(5.0, "five"));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn insert_errs_full_when_bounded_and_at_capacity() {
        let mut h: BoundedHeap<&str> = BoundedHeap::new(HeapMode::WorstTop, Some(1));
        h.insert(1.0, "a").unwrap();
        assert_eq!(h.insert(2.0, "b"), Err(HeapError::Full));
    }

    #[test]
    fn into_sorted_vec_is_always_best_to_worst() {
        let mut h = BoundedHeap::new(HeapMode::WorstTop, None);
        h.insert(2.0, "b").unwrap();
        h.insert(1.0, "a").unwrap();
        h.insert(3.0, "c").unwrap();
        assert_eq!(h.into_sorted_vec(), vec![(1.0, "a"), (2.0, "b"), (3.0, "c")]);
    }
}
