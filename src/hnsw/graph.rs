use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::SeedableRng;
use smallvec::{smallvec, SmallVec};
use tracing::{debug, trace};

use crate::distance::Metric;
use crate::heap::{BoundedHeap, HeapMode};
use crate::node::{capacity_for_level, sample_level, GraphNode, NodeIndex};
use crate::vector::{aligned_dims, VectorRecord};

use super::HnswConfig;

/// Entry-point set for a layer search: almost always a single node (the
/// result of the previous layer's greedy descent), so inline storage avoids
/// a heap allocation on the common path. Mirrors the grounding crate's
/// `SmallVec<[NodeId; 1]>` entry-point field.
type EntrySet = SmallVec<[NodeIndex; 1]>;

/// The multi-layer proximity graph. Nodes live in one contiguous arena;
/// every neighbor reference is a `u32` index into it (see [`crate::node`]).
pub struct HnswGraph {
    metric: Metric,
    dims: usize,
    dims_aligned: usize,
    config: HnswConfig,
    top_level: Option<u16>,
    gentry: Option<NodeIndex>,
    head: Option<NodeIndex>,
    tail: Option<NodeIndex>,
    arena: Vec<GraphNode>,
    /// Count of *alive* nodes; tombstones remain in the arena but are
    /// excluded here so `size()` matches caller-visible element count.
    count: usize,
    rng: StdRng,
}

impl HnswGraph {
    pub fn new(metric: Metric, dims: usize, config: HnswConfig) -> Self {
        let dims_aligned = aligned_dims(dims);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            metric,
            dims,
            dims_aligned,
            config,
            top_level: None,
            gentry: None,
            head: None,
            tail: None,
            arena: Vec::new(),
            count: 0,
            rng,
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

    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut HnswConfig {
        &mut self.config
    }

    /// Number of alive (non-tombstoned) elements.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn vector(&self, idx: NodeIndex) -> &VectorRecord {
        &self.arena[idx as usize].vector
    }

    pub fn is_alive(&self, idx: NodeIndex) -> bool {
        self.arena[idx as usize].alive
    }

    pub fn level_of(&self, idx: NodeIndex) -> u16 {
        self.arena[idx as usize].level
    }

    pub fn top_level(&self) -> Option<u16> {
        self.top_level
    }

    pub fn gentry(&self) -> Option<NodeIndex> {
        self.gentry
    }

    /// Insertion-ordered walk over every node ever created, alive or not —
    /// the "flat list" of §3/§4.F.7, used for tag-filtered scan, export, and
    /// `remap`.
    pub fn iter_flat(&self) -> FlatIter<'_> {
        FlatIter {
            graph: self,
            cur: self.head,
        }
    }

    fn rank_to(&self, idx: NodeIndex, query: &[f32]) -> f32 {
        let v = &self.arena[idx as usize].vector.values;
        self.metric.rank(self.metric.compare(v, query))
    }

    fn rank_between(&self, a: NodeIndex, b: NodeIndex) -> f32 {
        let va = &self.arena[a as usize].vector.values;
        let vb = &self.arena[b as usize].vector.values;
        self.metric.rank(self.metric.compare(va, vb))
    }

    /// Algorithm 2: single-layer best-first search. Returns the result set
    /// `W`, up to `ef` nodes, not further sorted (callers that need a
    /// best-first order call `into_sorted_vec` on the result).
    fn search_layer(
        &self,
        query: &[f32],
        entries: &[NodeIndex],
        ef: usize,
        level: u16,
        filter_alive: bool,
    ) -> BoundedHeap<NodeIndex> {
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut c = BoundedHeap::new(HeapMode::BetterTop, None);
        let mut w = BoundedHeap::new(HeapMode::WorstTop, Some(ef.max(1)));

        for &e in entries {
            if !visited.insert(e) {
                continue;
            }
            let rank = self.rank_to(e, query);
            c.insert(rank, e).expect("unbounded candidate heap never rejects an insert");
            if self.arena[e as usize].alive || !filter_alive {
                w.insert_or_replace_if_better(rank, e);
            }
        }

        while let Some((c_rank, c_idx)) = c.pop() {
            if w.is_full() {
                let (w_rank, _) = w.peek().expect("w is full, so it is nonempty");
                if c_rank > w_rank {
                    break;
                }
            }
            let node = &self.arena[c_idx as usize];
            if (level as usize) >= node.neighbors.len() {
                continue;
            }
            let neighbors = node.neighbors[level as usize].clone();
            for n in neighbors {
                if !visited.insert(n) {
                    continue;
                }
                let n_rank = self.rank_to(n, query);
                let beats_worst = w.peek().map_or(true, |(w_rank, _)| n_rank < w_rank);
                if !w.is_full() || beats_worst {
                    c.insert(n_rank, n).expect("unbounded candidate heap never rejects an insert");
                }
                if self.arena[n as usize].alive || !filter_alive {
                    w.insert_or_replace_if_better(n_rank, n);
                }
            }
        }

        trace!(level, ef, found = w.len(), "search_layer complete");
        w
    }

    /// Algorithm 4: neighbor selection. `simple` keeps the `m` best by
    /// distance; the heuristic pass additionally promotes angular spread
    /// (see the module docs on `EXTEND_CANDIDATES`/`KEEP_PRUNED`).
    fn select_simple(mut candidates: Vec<(f32, NodeIndex)>, m: usize) -> Vec<NodeIndex> {
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
        candidates.truncate(m);
        candidates.into_iter().map(|(_, idx)| idx).collect()
    }

    fn select_heuristic(
        &self,
        query: &[f32],
        w: Vec<(f32, NodeIndex)>,
        m: usize,
        level: u16,
        extend_candidates: bool,
        keep_pruned: bool,
    ) -> Vec<NodeIndex> {
        let mut working = BoundedHeap::new(HeapMode::BetterTop, None);
        let mut seen: HashSet<NodeIndex> = HashSet::new();

        for &(rank, idx) in &w {
            if seen.insert(idx) {
                working.insert(rank, idx).expect("unbounded heap never rejects an insert");
            }
        }

        if extend_candidates {
            // Each seed is recorded in `seen` before its neighbors are read,
            // so the seed itself can never be re-admitted as one of its own
            // extensions (see the design notes on EXTEND_CANDIDATES).
            for &(_, idx) in &w {
                let neighbors = self
                    .arena
                    .get(idx as usize)
                    .and_then(|n| n.neighbors.get(level as usize))
                    .cloned()
                    .unwrap_or_default();
                for cand in neighbors {
                    if seen.insert(cand) {
                        let rank = self.rank_to(cand, query);
                        working.insert(rank, cand).expect("unbounded heap never rejects an insert");
                    }
                }
            }
        }

        let mut result: Vec<NodeIndex> = Vec::with_capacity(m);
        let mut discarded = BoundedHeap::new(HeapMode::BetterTop, None);

        while result.len() < m {
            let Some((e_rank, e_idx)) = working.pop() else {
                break;
            };
            let admit = result
                .iter()
                .all(|&r_idx| self.rank_between(e_idx, r_idx) > e_rank);
            if admit {
                result.push(e_idx);
            } else if keep_pruned {
                discarded.insert(e_rank, e_idx).expect("unbounded heap never rejects an insert");
            }
        }

        if keep_pruned {
            while result.len() < m {
                match discarded.pop() {
                    Some((_, idx)) => result.push(idx),
                    None => break,
                }
            }
        }

        result
    }

    /// Algorithm 3 (reverse connection): add edge `n -> e`, shrinking `n`'s
    /// neighbor list at `level` back down to `m` via heuristic selection if
    /// it would otherwise overflow.
    fn backlink(&mut self, e: NodeIndex, n: NodeIndex, level: u16, m: usize) {
        let n_odegree = self.arena[n as usize].neighbors[level as usize].len();
        if n_odegree < m {
            self.arena[n as usize].neighbors[level as usize].push(e);
            self.arena[e as usize].idegree[level as usize] += 1;
            return;
        }

        debug!(node = n, level, "backlink shrink triggered");
        let existing: Vec<NodeIndex> = std::mem::take(&mut self.arena[n as usize].neighbors[level as usize]);
        for &old in &existing {
            let d = &mut self.arena[old as usize].idegree[level as usize];
            *d = d.saturating_sub(1);
        }

        let n_vector = self.arena[n as usize].vector.values.clone();
        let mut candidates: Vec<(f32, NodeIndex)> = existing
            .iter()
            .map(|&c| (self.rank_to(c, &n_vector), c))
            .collect();
        candidates.push((self.rank_to(e, &n_vector), e));

        let survivors = self.select_heuristic(&n_vector, candidates, m, level, false, true);
        for &s in &survivors {
            self.arena[s as usize].idegree[level as usize] += 1;
        }
        self.arena[n as usize].neighbors[level as usize] = survivors;
    }

    /// Algorithm 1: insert a new vector, returning its arena index.
    pub fn insert(&mut self, vector: VectorRecord) -> NodeIndex {
        let level = sample_level(&mut self.rng, self.config.m0);
        let idx = self.arena.len() as NodeIndex;
        self.arena.push(GraphNode::new(vector, level));

        if let Some(t) = self.tail {
            self.arena[t as usize].next = Some(idx);
        } else {
            self.head = Some(idx);
        }
        self.tail = Some(idx);

        if self.count == 0 && self.gentry.is_none() {
            self.gentry = Some(idx);
            self.top_level = Some(level);
            self.count = 1;
            return idx;
        }

        let query = self.arena[idx as usize].vector.values.clone();
        let top = self.top_level.expect("gentry implies top_level is set");
        let mut ep = self.gentry.expect("nonempty graph has a gentry");

        for lc in ((level + 1)..=top).rev() {
            let w = self.search_layer(&query, &[ep], 1, lc, false);
            if let Some((_, best)) = w.into_sorted_vec().into_iter().next() {
                ep = best;
            }
        }

        let mut ep_set: EntrySet = smallvec![ep];
        let start = level.min(top);
        for lc in (0..=start).rev() {
            let w = self.search_layer(&query, &ep_set, self.config.ef_construction, lc, false);
            let w_vec = w.into_sorted_vec();
            let m = capacity_for_level(lc, self.config.m0);
            let selected = self.select_heuristic(
                &query,
                w_vec,
                m,
                lc,
                self.config.extend_candidates,
                self.config.keep_pruned_connections,
            );

            for &s in &selected {
                self.arena[idx as usize].neighbors[lc as usize].push(s);
                self.arena[s as usize].idegree[lc as usize] += 1;
                self.backlink(idx, s, lc, m);
            }

            if !selected.is_empty() {
                ep_set = selected.into();
            }
        }

        self.count += 1;
        if level > top {
            self.gentry = Some(idx);
            self.top_level = Some(level);
        }
        idx
    }

    /// Algorithm 5: k-NN search over the graph. Results are sorted
    /// best-first and carry the raw (non-normalized) metric score.
    pub fn knn_search(&self, query: &[f32], k: usize, ef_search: Option<usize>) -> Vec<(NodeIndex, f32)> {
        if self.is_empty() || k == 0 {
            return Vec::new();
        }

        let top = self.top_level.expect("nonempty graph has a top level");
        let mut ep = self.gentry.expect("nonempty graph has a gentry");

        for lc in (1..=top).rev() {
            let w = self.search_layer(query, &[ep], 1, lc, false);
            if let Some((_, best)) = w.into_sorted_vec().into_iter().next() {
                ep = best;
            }
        }

        let ef = ef_search.unwrap_or(self.config.ef_search).max(2 * k);
        let w = self.search_layer(query, &[ep], ef, 0, true);
        let mut sorted = w.into_sorted_vec();
        sorted.truncate(k);
        sorted
            .into_iter()
            .map(|(rank, idx)| (idx, self.metric.rank(rank)))
            .collect()
    }

    /// §4.F.7: tag-filtered search bypasses the graph for a linear scan of
    /// the flat list.
    pub fn linear_scan(&self, query: &[f32], tag_mask: u64, k: usize) -> Vec<(NodeIndex, f32)> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap = BoundedHeap::new(HeapMode::WorstTop, Some(k));
        let mut cur = self.head;
        while let Some(idx) = cur {
            let node = &self.arena[idx as usize];
            if node.alive && node.vector.matches_tag(tag_mask) {
                let rank = self.rank_to(idx, query);
                heap.insert_or_replace_if_better(rank, idx);
            }
            cur = node.next;
        }
        let mut sorted = heap.into_sorted_vec();
        sorted.truncate(k);
        sorted
            .into_iter()
            .map(|(rank, idx)| (idx, self.metric.rank(rank)))
            .collect()
    }

    /// §4.F.8: mark a tombstone. Adjacency is left untouched so that other
    /// nodes' neighbor references remain valid for navigation.
    pub fn delete(&mut self, idx: NodeIndex) {
        let node = &mut self.arena[idx as usize];
        if node.alive {
            node.alive = false;
            self.count -= 1;
            trace!(node = idx, "tombstoned");
        }
    }
}

/// Insertion-ordered iterator over every node in the arena (alive or
/// tombstoned), following [`GraphNode::next`].
pub struct FlatIter<'a> {
    graph: &'a HnswGraph,
    cur: Option<NodeIndex>,
}

impl<'a> Iterator for FlatIter<'a> {
    type Item = (NodeIndex, &'a GraphNode);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cur?;
        let node = &self.graph.arena[idx as usize];
        self.cur = node.next;
        Some((idx, node))
    }
}
