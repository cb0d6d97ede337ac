//! Exact flat-scan index (§10.5): a correctness oracle for recall
//! measurement, and a usable exact index in its own right for small
//! collections. Honors the same tag-filter semantics as the HNSW backend's
//! linear scan (§4.F.7), and parallelizes the scan with `rayon` once the
//! live set is large enough to amortize the fan-out (§5: "the exact flat
//! variant may spawn worker threads for parallel scan").

use rayon::prelude::*;

use crate::distance::Metric;
use crate::heap::{BoundedHeap, HeapMode};
use crate::vector::{aligned_dims, VectorRecord};

/// Below this many live vectors, a sequential scan is cheaper than paying
/// for rayon's fan-out/fan-in.
const PARALLEL_SCAN_THRESHOLD: usize = 4096;

#[derive(Debug, Clone)]
struct Entry {
    vector: VectorRecord,
    alive: bool,
}

pub struct FlatIndex {
    metric: Metric,
    dims: usize,
    dims_aligned: usize,
    entries: Vec<Entry>,
    alive_count: usize,
}

impl FlatIndex {
    pub fn new(metric: Metric, dims: usize) -> Self {
        Self {
            metric,
            dims,
            dims_aligned: aligned_dims(dims),
            entries: Vec::new(),
            alive_count: 0,
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn dims_aligned(&self) -> usize {
        self.dims_aligned
    }

    pub fn len(&self) -> usize {
        self.alive_count
    }

    pub fn is_empty(&self) -> bool {
        self.alive_count == 0
    }

    /// Returns the slot index of the newly appended record.
    pub fn insert(&mut self, vector: VectorRecord) -> usize {
        let idx = self.entries.len();
        self.entries.push(Entry { vector, alive: true });
        self.alive_count += 1;
        idx
    }

    pub fn delete(&mut self, idx: usize) {
        if let Some(e) = self.entries.get_mut(idx) {
            if e.alive {
                e.alive = false;
                self.alive_count -= 1;
            }
        }
    }

    pub fn vector(&self, idx: usize) -> &VectorRecord {
        &self.entries[idx].vector
    }

    pub fn is_alive(&self, idx: usize) -> bool {
        self.entries[idx].alive
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &VectorRecord)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.alive)
            .map(|(i, e)| (i, &e.vector))
    }

    /// Exact top-k by the configured metric, honoring `tag_mask` (`0` means
    /// unfiltered) the same way the HNSW backend's linear scan does.
    #[tracing::instrument(skip(self, query))]
    pub fn search(&self, query: &[f32], tag_mask: u64, k: usize) -> Vec<(usize, f32)> {
        if k == 0 {
            return Vec::new();
        }
        let metric = self.metric;
        let candidates: Vec<(f32, usize)> = if self.alive_count >= PARALLEL_SCAN_THRESHOLD {
            self.entries
                .par_iter()
                .enumerate()
                .filter(|(_, e)| e.alive && e.vector.matches_tag(tag_mask))
                .map(|(i, e)| (metric.rank(metric.compare(&e.vector.values, query)), i))
                .collect()
        } else {
            self.entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.alive && e.vector.matches_tag(tag_mask))
                .map(|(i, e)| (metric.rank(metric.compare(&e.vector.values, query)), i))
                .collect()
        };

        let mut heap = BoundedHeap::new(HeapMode::WorstTop, Some(k));
        for (rank, idx) in candidates {
            heap.insert_or_replace_if_better(rank, idx);
        }
        let mut sorted = heap.into_sorted_vec();
        sorted.truncate(k);
        sorted
            .into_iter()
            .map(|(rank, idx)| (idx, metric.rank(rank)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(id: u64, values: [f32; 4]) -> VectorRecord {
        VectorRecord::new(id, 0, values.to_vec())
    }

    #[test]
    fn exact_search_returns_nearest_first() {
        let mut idx = FlatIndex::new(Metric::L2, 4);
        idx.insert(v(1, [1.0, 0.0, 0.0, 0.0]));
        idx.insert(v(2, [0.0, 1.0, 0.0, 0.0]));
        idx.insert(v(3, [0.0, 0.0, 1.0, 0.0]));

        let results = idx.search(&[1.0, 0.0, 0.0, 0.0], 0, 2);
        assert_eq!(results[0].0, 0);
        assert!(results[0].1.abs() < 1e-6);
        assert_eq!(results[1].0, 1);
    }

    #[test]
    fn delete_removes_from_results_and_decrements_len() {
        let mut idx = FlatIndex::new(Metric::L2, 4);
        idx.insert(v(1, [1.0, 0.0, 0.0, 0.0]));
        idx.insert(v(2, [0.0, 1.0, 0.0, 0.0]));
        idx.delete(0);
        assert_eq!(idx.len(), 1);
        let results = idx.search(&[1.0, 0.0, 0.0, 0.0], 0, 1);
        assert_eq!(results[0].0, 1);
    }

    #[test]
    fn tag_filter_excludes_non_matching() {
        let mut idx = FlatIndex::new(Metric::L2, 4);
        idx.insert(VectorRecord::new(1, 0b01, vec![1.0, 0.0, 0.0, 0.0]));
        idx.insert(VectorRecord::new(2, 0b10, vec![0.0, 1.0, 0.0, 0.0]));
        let results = idx.search(&[1.0, 0.0, 0.0, 0.0], 0b10, 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 1);
    }
}
