//! Graph node (component E): arena-indexed adjacency.
//!
//! The grounding crate represents each node's neighbor lists as
//! `HashMap<LayerIndex, HashSet<NodeId>>` over a lock-free `papaya` map of
//! nodes. Per the arena+index redesign (see design notes), nodes here live
//! in one contiguous `Vec<GraphNode>` owned by [`crate::hnsw::HnswGraph`],
//! and every neighbor reference is a `u32` index into that arena rather than
//! a pointer or a content hash — this keeps neighbor access O(1) and cache
//! local without any lock-free map underneath it, since the facade's single
//! read-write lock (§4.G) already serializes all mutation.

use rand::Rng;

use crate::vector::VectorRecord;

/// Index into the arena owned by an `HnswGraph`. `u32` caps a single index
/// at ~4 billion live+tombstoned nodes, which is far beyond what an
/// in-memory graph can hold anyway.
pub type NodeIndex = u32;

/// A single node in the HNSW graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub vector: VectorRecord,
    /// Highest level this node inhabits; participates in levels `0..=level`.
    pub level: u16,
    /// Tombstone flag. `false` means logically deleted but structurally
    /// retained — see invariant 6.
    pub alive: bool,
    /// `neighbors[l]` holds this node's out-edges at level `l`, capped at
    /// `capacity(l)`. `neighbors[l].len()` is `odegree(l)`.
    pub neighbors: Vec<Vec<NodeIndex>>,
    /// `idegree[l]` is an advisory inbound-edge counter for level `l`; see
    /// the open question on `backlink` shrink in the design notes — it is
    /// not treated as a strict invariant.
    pub idegree: Vec<u32>,
    /// Next node in insertion order (the flat list), or `None` if this is
    /// the last node inserted so far.
    pub next: Option<NodeIndex>,
}

impl GraphNode {
    pub fn new(vector: VectorRecord, level: u16) -> Self {
        let levels = level as usize + 1;
        Self {
            vector,
            level,
            alive: true,
            neighbors: vec![Vec::new(); levels],
            idegree: vec![0; levels],
            next: None,
        }
    }

    pub fn odegree(&self, level: u16) -> usize {
        self.neighbors[level as usize].len()
    }

    pub fn inhabits(&self, level: u16) -> bool {
        level <= self.level
    }
}

/// Per-level neighbor slot capacity: `M0` at level 0, `M0/2` above.
pub fn capacity_for_level(level: u16, m0: usize) -> usize {
    if level == 0 {
        m0
    } else {
        (m0 / 2).max(1)
    }
}

/// Sample a node's top level: `floor(-ln(U) * (1 / ln(M0/2)))`, `U` uniform
/// in `(0, 1)` with the endpoints excluded.
pub fn sample_level(rng: &mut impl Rng, m0: usize) -> u16 {
    let m_l = (m0 / 2).max(2) as f64;
    let inv_log_m = 1.0 / m_l.ln();
    let u: f64 = loop {
        let u = rng.gen::<f64>();
        if u > 0.0 && u < 1.0 {
            break u;
        }
    };
    let level = (-u.ln() * inv_log_m).floor();
    level.max(0.0) as u16
}
