//! Index facade (component G): the public surface of the crate.
//!
//! Wraps one concrete backend ([`IndexKind::Flat`] or [`IndexKind::Hnsw`])
//! behind a single-writer/multi-reader lock (§5) and a per-operation timing
//! table. `insert` and `delete` take the writer; every other call takes a
//! reader. Timing statistics live behind their own mutex rather than inside
//! the main lock, since §5 never lists them among the lock-protected shared
//! resources — a reader recording its own latency must not need to upgrade
//! to the writer lock to do so.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::distance::Metric;
use crate::error::{Error, Result};
use crate::flat::FlatIndex;
use crate::hnsw::{HnswConfig, HnswGraph};
use crate::idmap::IdMap;
use crate::persistence;
use crate::vector::{aligned_dims, pad_to_aligned, VectorRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Flat,
    Hnsw,
}

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub kind: IndexKind,
    pub metric: Metric,
    pub dims: usize,
    pub hnsw: HnswConfig,
}

impl IndexConfig {
    pub fn new(kind: IndexKind, metric: Metric, dims: usize) -> Self {
        Self {
            kind,
            metric,
            dims,
            hnsw: HnswConfig::default(),
        }
    }

    pub fn with_hnsw_config(mut self, hnsw: HnswConfig) -> Self {
        self.hnsw = hnsw;
        self
    }
}

/// Bitmask-as-struct for `update_context` (§4.G): each `Some` field replaces
/// the corresponding HNSW parameter; `None` leaves it untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextUpdate {
    pub ef_search: Option<usize>,
    pub ef_construction: Option<usize>,
    pub m0: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Overwrite,
    Ignore,
    IgnoreVerbose,
}

/// Either an id already present in the index, or an ad-hoc vector, for
/// `compare_one` (§10.5).
#[derive(Debug, Clone)]
pub enum CompareTarget {
    Id(u64),
    Vector(Vec<f32>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchMatch {
    pub id: u64,
    pub tag: u64,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Insert,
    Delete,
    SearchN,
    Contains,
    Size,
    Stats,
    Export,
    Import,
    UpdateContext,
    CompareOne,
    Remap,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OpStat {
    pub count: u64,
    pub total_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub last_ms: f64,
}

enum Backend {
    Flat(FlatIndex),
    Hnsw(HnswGraph),
}

struct IndexInner {
    backend: Backend,
    id_map: IdMap<u64>,
}

/// An embeddable approximate (or, for [`IndexKind::Flat`], exact)
/// nearest-neighbor index over 64-bit-keyed vectors.
pub struct Index {
    kind: IndexKind,
    metric: Metric,
    dims: usize,
    dims_aligned: usize,
    inner: RwLock<IndexInner>,
    stats: Mutex<HashMap<OpKind, OpStat>>,
}

impl Index {
    pub fn new(config: IndexConfig) -> Result<Self> {
        if config.dims == 0 {
            return Err(Error::InvalidDimensions { expected: 1, found: 0 });
        }
        let dims_aligned = aligned_dims(config.dims);
        let backend = match config.kind {
            IndexKind::Flat => Backend::Flat(FlatIndex::new(config.metric, config.dims)),
            IndexKind::Hnsw => Backend::Hnsw(HnswGraph::new(config.metric, config.dims, config.hnsw)),
        };
        Ok(Self {
            kind: config.kind,
            metric: config.metric,
            dims: config.dims,
            dims_aligned,
            inner: RwLock::new(IndexInner {
                backend,
                id_map: IdMap::new(),
            }),
            stats: Mutex::new(HashMap::new()),
        })
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    fn record(&self, op: OpKind, start: Instant) {
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let mut stats = self.stats.lock();
        let stat = stats.entry(op).or_default();
        if stat.count == 0 {
            stat.min_ms = elapsed_ms;
            stat.max_ms = elapsed_ms;
        } else {
            stat.min_ms = stat.min_ms.min(elapsed_ms);
            stat.max_ms = stat.max_ms.max(elapsed_ms);
        }
        stat.count += 1;
        stat.total_ms += elapsed_ms;
        stat.last_ms = elapsed_ms;
    }

    fn validate_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dims {
            return Err(Error::InvalidDimensions {
                expected: self.dims,
                found: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidVector("vector contains a non-finite component".into()));
        }
        Ok(())
    }

    /// §4.G insert order of responsibility: validate, take the writer,
    /// duplicate-check via the id map, delegate to the backend, then
    /// register the returned reference in the id map.
    #[tracing::instrument(skip(self, vector))]
    pub fn insert(&self, id: u64, tag: u64, vector: &[f32]) -> Result<()> {
        let start = Instant::now();
        if id == 0 {
            self.record(OpKind::Insert, start);
            return Err(Error::InvalidId);
        }
        if let Err(e) = self.validate_vector(vector) {
            self.record(OpKind::Insert, start);
            return Err(e);
        }

        let mut inner = self.inner.write();
        if inner.id_map.has(id) {
            drop(inner);
            self.record(OpKind::Insert, start);
            return Err(Error::DuplicatedEntry(id));
        }

        let padded = pad_to_aligned(vector, self.dims_aligned);
        let record = VectorRecord::new(id, tag, padded);
        let node_ref: u64 = match &mut inner.backend {
            Backend::Flat(f) => f.insert(record) as u64,
            Backend::Hnsw(h) => h.insert(record) as u64,
        };
        inner.id_map.insert(id, node_ref);
        drop(inner);
        self.record(OpKind::Insert, start);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&self, id: u64) -> Result<()> {
        let start = Instant::now();
        if id == 0 {
            self.record(OpKind::Delete, start);
            return Err(Error::InvalidId);
        }
        let mut inner = self.inner.write();
        let node_ref = match inner.id_map.remove(id) {
            Some(r) => r,
            None => {
                drop(inner);
                self.record(OpKind::Delete, start);
                return Err(Error::NotFoundId(id));
            }
        };
        match &mut inner.backend {
            Backend::Hnsw(h) => h.delete(node_ref as u32),
            Backend::Flat(f) => f.delete(node_ref as usize),
        }
        drop(inner);
        self.record(OpKind::Delete, start);
        Ok(())
    }

    #[tracing::instrument(skip(self, vector))]
    pub fn search_n(&self, vector: &[f32], tag_mask: u64, k: usize) -> Result<Vec<SearchMatch>> {
        let start = Instant::now();
        if let Err(e) = self.validate_vector(vector) {
            self.record(OpKind::SearchN, start);
            return Err(e);
        }

        let inner = self.inner.read();
        let empty = match &inner.backend {
            Backend::Hnsw(h) => h.is_empty(),
            Backend::Flat(f) => f.is_empty(),
        };
        if empty {
            drop(inner);
            self.record(OpKind::SearchN, start);
            return Err(Error::IndexEmpty);
        }

        let padded = pad_to_aligned(vector, self.dims_aligned);
        let matches: Vec<SearchMatch> = match &inner.backend {
            Backend::Hnsw(h) => {
                let raw = if tag_mask != 0 {
                    h.linear_scan(&padded, tag_mask, k)
                } else {
                    h.knn_search(&padded, k, None)
                };
                raw.into_iter()
                    .map(|(idx, score)| {
                        let rec = h.vector(idx);
                        SearchMatch { id: rec.id, tag: rec.tag, score }
                    })
                    .collect()
            }
            Backend::Flat(f) => f
                .search(&padded, tag_mask, k)
                .into_iter()
                .map(|(idx, score)| {
                    let rec = f.vector(idx);
                    SearchMatch { id: rec.id, tag: rec.tag, score }
                })
                .collect(),
        };
        drop(inner);
        self.record(OpKind::SearchN, start);
        Ok(matches)
    }

    pub fn contains(&self, id: u64) -> bool {
        let start = Instant::now();
        let result = self.inner.read().id_map.has(id);
        self.record(OpKind::Contains, start);
        result
    }

    pub fn size(&self) -> usize {
        let start = Instant::now();
        let inner = self.inner.read();
        let result = match &inner.backend {
            Backend::Hnsw(h) => h.len(),
            Backend::Flat(f) => f.len(),
        };
        drop(inner);
        self.record(OpKind::Size, start);
        result
    }

    pub fn stats(&self) -> HashMap<OpKind, OpStat> {
        let start = Instant::now();
        let snapshot = self.stats.lock().clone();
        self.record(OpKind::Stats, start);
        snapshot
    }

    #[tracing::instrument(skip(self))]
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let start = Instant::now();
        let inner = self.inner.read();
        let records: Vec<VectorRecord> = match &inner.backend {
            Backend::Hnsw(h) => h
                .iter_flat()
                .filter(|(_, n)| n.alive)
                .map(|(_, n)| n.vector.clone())
                .collect(),
            Backend::Flat(f) => f.iter().map(|(_, v)| v.clone()).collect(),
        };
        drop(inner);

        let magic = match self.kind {
            IndexKind::Hnsw => persistence::MAGIC_HNSW,
            IndexKind::Flat => persistence::MAGIC_FLAT,
        };
        let result = (|| -> Result<()> {
            let file = std::fs::File::create(path)?;
            persistence::export_vectors(file, magic, self.metric, self.dims, self.dims_aligned, &records)
        })();
        self.record(OpKind::Export, start);
        result
    }

    /// On dimension mismatch, fails without mutating the index.
    #[tracing::instrument(skip(self))]
    pub fn import(&self, path: impl AsRef<Path>, mode: ImportMode) -> Result<()> {
        let start = Instant::now();
        let result = (|| -> Result<()> {
            let file = std::fs::File::open(path)?;
            let imported = persistence::import_vectors(file)?;
            if imported.dims != self.dims {
                return Err(Error::InvalidDimensions {
                    expected: self.dims,
                    found: imported.dims,
                });
            }

            let mut inner = self.inner.write();
            for record in imported.records {
                let id = record.id;
                if inner.id_map.has(id) {
                    match mode {
                        ImportMode::Overwrite => {
                            if let Some(old_ref) = inner.id_map.remove(id) {
                                match &mut inner.backend {
                                    Backend::Hnsw(h) => h.delete(old_ref as u32),
                                    Backend::Flat(f) => f.delete(old_ref as usize),
                                }
                            }
                        }
                        ImportMode::Ignore => continue,
                        ImportMode::IgnoreVerbose => {
                            tracing::warn!(id, "import: skipping duplicate id");
                            continue;
                        }
                    }
                }
                let node_ref: u64 = match &mut inner.backend {
                    Backend::Hnsw(h) => h.insert(record) as u64,
                    Backend::Flat(f) => f.insert(record) as u64,
                };
                inner.id_map.insert(id, node_ref);
            }
            Ok(())
        })();
        self.record(OpKind::Import, start);
        result
    }

    /// Replaces the HNSW parameters named by `update`. No rebuild is
    /// triggered. Errs with [`Error::NotImplemented`] on a [`IndexKind::Flat`]
    /// backend, which has no tunable parameters to update.
    pub fn update_context(&self, update: ContextUpdate) -> Result<()> {
        let start = Instant::now();
        let mut inner = self.inner.write();
        let result = match &mut inner.backend {
            Backend::Hnsw(h) => {
                let cfg = h.config_mut();
                if let Some(v) = update.ef_search {
                    cfg.ef_search = v;
                }
                if let Some(v) = update.ef_construction {
                    cfg.ef_construction = v;
                }
                if let Some(v) = update.m0 {
                    cfg.m0 = v;
                }
                Ok(())
            }
            Backend::Flat(_) => Err(Error::NotImplemented("update_context is not applicable to a flat index")),
        };
        drop(inner);
        self.record(OpKind::UpdateContext, start);
        result
    }

    fn resolve_vector(&self, inner: &IndexInner, target: CompareTarget) -> Result<Vec<f32>> {
        match target {
            CompareTarget::Id(id) => {
                let node_ref = inner.id_map.get(id).ok_or(Error::NotFoundId(id))?;
                let values = match &inner.backend {
                    Backend::Hnsw(h) => h.vector(node_ref as u32).values.clone(),
                    Backend::Flat(f) => f.vector(node_ref as usize).values.clone(),
                };
                Ok(values)
            }
            CompareTarget::Vector(v) => {
                self.validate_vector(&v)?;
                Ok(pad_to_aligned(&v, self.dims_aligned))
            }
        }
    }

    /// Distance between two ids, two vectors, or an id and a vector, under
    /// this index's configured metric (§10.5).
    pub fn compare_one(&self, a: CompareTarget, b: CompareTarget) -> Result<f32> {
        let start = Instant::now();
        let inner = self.inner.read();
        let result = (|| -> Result<f32> {
            let va = self.resolve_vector(&inner, a)?;
            let vb = self.resolve_vector(&inner, b)?;
            Ok(self.metric.compare(&va, &vb))
        })();
        drop(inner);
        self.record(OpKind::CompareOne, start);
        result
    }

    /// Rebuild the id map from the flat list/entry list. Never mutates the
    /// graph; used after a bulk import or to repair a map believed
    /// inconsistent (§10.5).
    pub fn remap(&self) -> Result<()> {
        let start = Instant::now();
        let mut inner = self.inner.write();
        inner.id_map.purge();
        match &inner.backend {
            Backend::Hnsw(h) => {
                let entries: Vec<(u64, u64)> = h
                    .iter_flat()
                    .filter(|(_, n)| n.alive)
                    .map(|(idx, n)| (n.vector.id, idx as u64))
                    .collect();
                for (id, node_ref) in entries {
                    inner.id_map.insert(id, node_ref);
                }
            }
            Backend::Flat(f) => {
                let entries: Vec<(u64, u64)> = f.iter().map(|(idx, v)| (v.id, idx as u64)).collect();
                for (id, node_ref) in entries {
                    inner.id_map.insert(id, node_ref);
                }
            }
        }
        drop(inner);
        self.record(OpKind::Remap, start);
        Ok(())
    }

    /// Explicit teardown, matching the capability set of §4.G. Equivalent to
    /// dropping the index, but logs the final size first.
    pub fn release(self) {
        tracing::debug!(size = self.size(), "index released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hnsw_config() -> HnswConfig {
        HnswConfig::default().with_m0(8).with_seed(11)
    }

    #[test]
    fn s1_insert_and_search_l2() {
        let idx = Index::new(IndexConfig::new(IndexKind::Hnsw, Metric::L2, 4).with_hnsw_config(hnsw_config())).unwrap();
        idx.insert(1, 0, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        idx.insert(2, 0, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        idx.insert(3, 0, &[0.0, 0.0, 1.0, 0.0]).unwrap();

        let results = idx.search_n(&[1.0, 0.0, 0.0, 0.0], 0, 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 1);
        assert!(results[0].score.abs() < 1e-4);
        assert_eq!(results[1].id, 2);
        assert!((results[1].score - std::f32::consts::SQRT_2).abs() < 1e-3);
    }

    #[test]
    fn s2_delete_then_search() {
        let idx = Index::new(IndexConfig::new(IndexKind::Hnsw, Metric::L2, 4).with_hnsw_config(hnsw_config())).unwrap();
        idx.insert(1, 0, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        idx.insert(2, 0, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        idx.insert(3, 0, &[0.0, 0.0, 1.0, 0.0]).unwrap();
        idx.delete(1).unwrap();

        let results = idx.search_n(&[1.0, 0.0, 0.0, 0.0], 0, 1).unwrap();
        assert_eq!(results[0].id, 2);
        assert!(!idx.contains(1));
        assert_eq!(idx.size(), 2);
    }

    #[test]
    fn s3_cosine_similarity_scores() {
        let idx = Index::new(IndexConfig::new(IndexKind::Hnsw, Metric::Cosine, 4).with_hnsw_config(hnsw_config())).unwrap();
        idx.insert(1, 0, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        idx.insert(2, 0, &[-1.0, 0.0, 0.0, 0.0]).unwrap();

        let results = idx.search_n(&[1.0, 0.0, 0.0, 0.0], 0, 2).unwrap();
        assert_eq!(results[0].id, 1);
        assert!((results[0].score - 1.0).abs() < 1e-5);
        assert_eq!(results[1].id, 2);
        assert!((results[1].score - (-1.0)).abs() < 1e-5);
    }

    #[test]
    fn s5_duplicate_id_rejected() {
        let idx = Index::new(IndexConfig::new(IndexKind::Flat, Metric::L2, 4)).unwrap();
        idx.insert(1, 0, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let err = idx.insert(1, 0, &[1.0, 2.0, 3.0, 4.0]).unwrap_err();
        assert!(matches!(err, Error::DuplicatedEntry(1)));
        assert_eq!(idx.size(), 1);
    }

    #[test]
    fn search_on_empty_index_errs() {
        let idx = Index::new(IndexConfig::new(IndexKind::Flat, Metric::L2, 4)).unwrap();
        let err = idx.search_n(&[1.0, 0.0, 0.0, 0.0], 0, 1).unwrap_err();
        assert!(matches!(err, Error::IndexEmpty));
    }

    #[test]
    fn tag_filtering_matches_mask() {
        let idx = Index::new(IndexConfig::new(IndexKind::Flat, Metric::L2, 4)).unwrap();
        idx.insert(1, 0b01, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        idx.insert(2, 0b10, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        let results = idx.search_n(&[0.0, 1.0, 0.0, 0.0], 0b10, 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 2);
    }

    #[test]
    fn compare_one_between_two_ids() {
        let idx = Index::new(IndexConfig::new(IndexKind::Flat, Metric::L2, 4)).unwrap();
        idx.insert(1, 0, &[0.0, 0.0, 0.0, 0.0]).unwrap();
        idx.insert(2, 0, &[3.0, 4.0, 0.0, 0.0]).unwrap();
        let d = idx.compare_one(CompareTarget::Id(1), CompareTarget::Id(2)).unwrap();
        assert!((d - 5.0).abs() < 1e-4);
    }

    #[test]
    fn stats_tracks_operation_counts() {
        let idx = Index::new(IndexConfig::new(IndexKind::Flat, Metric::L2, 4)).unwrap();
        idx.insert(1, 0, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        idx.insert(2, 0, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        let stats = idx.stats();
        assert_eq!(stats.get(&OpKind::Insert).unwrap().count, 2);
    }

    #[test]
    fn export_then_import_roundtrips_into_fresh_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.bin");

        let original = Index::new(IndexConfig::new(IndexKind::Flat, Metric::L2, 4)).unwrap();
        original.insert(1, 5, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        original.insert(2, 0, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        original.export(&path).unwrap();

        let restored = Index::new(IndexConfig::new(IndexKind::Flat, Metric::L2, 4)).unwrap();
        restored.import(&path, ImportMode::Overwrite).unwrap();
        assert_eq!(restored.size(), 2);
        assert!(restored.contains(1));
        let results = restored.search_n(&[1.0, 0.0, 0.0, 0.0], 0, 1).unwrap();
        assert_eq!(results[0].id, 1);
        assert_eq!(results[0].tag, 5);
    }
}
