//! HNSW core (component F): level assignment, layered search, neighbor
//! selection, and bidirectional connection with shrink.
//!
//! This is the load-bearing module of the crate; see [`graph::HnswGraph`]
//! for the algorithms themselves, adapted from the grounding crate's
//! `hnsw::index::HNSW<D>` (layer search, heuristic selection, insert,
//! k-NN search) onto an arena-indexed graph instead of a lock-free
//! `papaya`-backed one — see the design notes on why.

mod graph;

pub use graph::{FlatIter, HnswGraph};

/// Build/query-time parameters for an HNSW graph. Mirrors the grounding
/// crate's `HNSWConfig`, renamed to this crate's vocabulary (`m0` instead of
/// `maximum_connections`) and extended with an optional PRNG seed for
/// reproducible level assignment.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HnswConfig {
    pub m0: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub extend_candidates: bool,
    pub keep_pruned_connections: bool,
    pub seed: Option<u64>,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m0: 32,
            ef_construction: 220,
            ef_search: 110,
            extend_candidates: true,
            keep_pruned_connections: true,
            seed: None,
        }
    }
}

impl HnswConfig {
    pub fn with_m0(mut self, m0: usize) -> Self {
        self.m0 = m0;
        self
    }

    pub fn with_ef_construction(mut self, ef_construction: usize) -> Self {
        self.ef_construction = ef_construction;
        self
    }

    pub fn with_ef_search(mut self, ef_search: usize) -> Self {
        self.ef_search = ef_search;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
