//! Vector record (component D): a caller id, a filter tag, and a 4-lane
//! aligned payload.

/// `dims_aligned = ceil(dims/4)*4`. Padding lanes are zeroed so they never
/// perturb L2 distance and never inflate a cosine norm.
pub fn aligned_dims(dims: usize) -> usize {
    (dims + 3) / 4 * 4
}

/// Pad `values` (already `dims` long) out to `dims_aligned` with zeros.
pub fn pad_to_aligned(values: &[f32], dims_aligned: usize) -> Vec<f32> {
    let mut padded = Vec::with_capacity(dims_aligned);
    padded.extend_from_slice(values);
    padded.resize(dims_aligned, 0.0);
    padded
}

/// A stored vector: `id` is caller-supplied and nonzero (`0` denotes null),
/// `tag` is a bitmask available for [`crate::hnsw::HnswGraph`]'s tag-filtered
/// linear scan, `values` is always `dims_aligned` long.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VectorRecord {
    pub id: u64,
    pub tag: u64,
    pub values: Vec<f32>,
}

impl VectorRecord {
    pub fn new(id: u64, tag: u64, values: Vec<f32>) -> Self {
        Self { id, tag, values }
    }

    pub fn matches_tag(&self, mask: u64) -> bool {
        mask == 0 || (self.tag & mask) != 0
    }
}
