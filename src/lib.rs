//! Embeddable approximate nearest-neighbor search over an HNSW graph index,
//! plus an exact flat-scan index for correctness baselines and small
//! collections.
//!
//! The public surface is [`Index`], a single type that wraps either backend
//! behind one read-write lock. Construct one with [`IndexConfig`]:
//!
//! ```no_run
//! use ann_index::{Index, IndexConfig, IndexKind, Metric};
//!
//! let index = Index::new(IndexConfig::new(IndexKind::Hnsw, Metric::Cosine, 128)).unwrap();
//! index.insert(1, 0, &vec![0.0f32; 128]).unwrap();
//! let hits = index.search_n(&vec![0.0f32; 128], 0, 10).unwrap();
//! ```

pub mod distance;
pub mod error;
pub mod flat;
pub mod heap;
pub mod hnsw;
pub mod idmap;
pub mod index;
pub mod node;
pub mod persistence;
pub mod vector;

pub use distance::Metric;
pub use error::{Error, Result};
pub use hnsw::HnswConfig;
pub use index::{CompareTarget, ContextUpdate, Index, IndexConfig, IndexKind, ImportMode, OpKind, OpStat, SearchMatch};
pub use vector::VectorRecord;
