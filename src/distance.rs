//! Pairwise distance/similarity kernels over aligned `f32` buffers.
//!
//! Every kernel is dispatched through [`pulp`] so the same source compiles to
//! scalar, SSE/AVX, or NEON code depending on what the host CPU offers.
//! Callers are expected to pass buffers already padded to a multiple of 4
//! lanes with zeroed padding (see [`crate::vector`]) — padding lanes
//! contribute `0` to every sum here, so they neither perturb L2 distance nor
//! inflate cosine norms.

use pulp::{Arch, Simd, WithSimd};

/// Distance/similarity metric selector.
///
/// `L2` is "smaller is better"; `Cosine` and `Dot` are "larger is better".
/// [`Metric::is_better`] hides that asymmetry from callers that just want to
/// compare two scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Metric {
    L2,
    Cosine,
    Dot,
}

impl Metric {
    /// Wire-format code used by the persistence header (`method` field).
    pub fn code(self) -> u16 {
        match self {
            Metric::L2 => 0,
            Metric::Cosine => 1,
            Metric::Dot => 2,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Metric::L2),
            1 => Some(Metric::Cosine),
            2 => Some(Metric::Dot),
            _ => None,
        }
    }

    /// Score assigned to an empty or otherwise unreachable comparison.
    pub fn worst_value(self) -> f32 {
        match self {
            Metric::L2 => f32::INFINITY,
            Metric::Cosine | Metric::Dot => -1.0,
        }
    }

    /// `true` if `a` ranks ahead of (is preferable to) `b` under this metric.
    #[inline]
    pub fn is_better(self, a: f32, b: f32) -> bool {
        match self {
            Metric::L2 => a < b,
            Metric::Cosine | Metric::Dot => a > b,
        }
    }

    /// Pairwise score between two equal-length, 4-lane-padded buffers.
    #[inline]
    pub fn compare(self, u: &[f32], v: &[f32]) -> f32 {
        match self {
            Metric::L2 => euclidean_distance(u, v),
            Metric::Cosine => cosine_similarity(u, v),
            Metric::Dot => dot_product(u, v),
        }
    }

    /// Normalized rank where smaller always means better, regardless of
    /// metric. Used internally by the bounded heap so it never has to know
    /// which way a given metric orders its scores.
    #[inline]
    pub fn rank(self, score: f32) -> f32 {
        match self {
            Metric::L2 => score,
            Metric::Cosine | Metric::Dot => -score,
        }
    }
}

struct Magnitude<'a> {
    first: &'a [f32],
    second: &'a [f32],
}

impl WithSimd for Magnitude<'_> {
    type Output = f32;

    #[inline(always)]
    fn with_simd<S: Simd>(self, simd: S) -> Self::Output {
        let (first_head, first_tail) = S::as_simd_f32s(self.first);
        let (second_head, second_tail) = S::as_simd_f32s(self.second);

        let mut mag_first = simd.splat_f32s(0.0);
        let mut mag_second = simd.splat_f32s(0.0);

        for (&chunk_first, &chunk_second) in first_head.iter().zip(second_head) {
            mag_first = simd.mul_add_f32s(chunk_first, chunk_first, mag_first);
            mag_second = simd.mul_add_f32s(chunk_second, chunk_second, mag_second);
        }

        let mag_first = simd.reduce_sum_f32s(mag_first);
        let mag_second = simd.reduce_sum_f32s(mag_second);

        let mut scalar_mag_first = 0.0;
        let mut scalar_mag_second = 0.0;

        for (&x, &y) in first_tail.iter().zip(second_tail) {
            scalar_mag_first += x * x;
            scalar_mag_second += y * y;
        }

        ((mag_first + scalar_mag_first).sqrt()) * ((mag_second + scalar_mag_second).sqrt())
    }
}

/// Cosine similarity in `[-1, 1]`; `1` is identical direction, `-1` opposite.
/// Returns `0.0` if either vector has zero magnitude (undefined angle).
#[tracing::instrument(skip_all)]
pub fn cosine_similarity(first: &[f32], second: &[f32]) -> f32 {
    debug_assert_eq!(first.len(), second.len(), "vectors must have equal length");

    let dot = dot_product(first, second);
    let arch = Arch::new();
    let magnitude = arch.dispatch(Magnitude { first, second });

    if magnitude == 0.0 {
        0.0
    } else {
        dot / magnitude
    }
}

struct DotProduct<'a> {
    first: &'a [f32],
    second: &'a [f32],
}

impl WithSimd for DotProduct<'_> {
    type Output = f32;

    #[inline(always)]
    fn with_simd<S: Simd>(self, simd: S) -> Self::Output {
        let (first_head, first_tail) = S::as_simd_f32s(self.first);
        let (second_head, second_tail) = S::as_simd_f32s(self.second);

        let mut sum_of_points = simd.splat_f32s(0.0);

        for (&chunk_first, &chunk_second) in first_head.iter().zip(second_head) {
            sum_of_points = simd.mul_add_f32s(chunk_first, chunk_second, sum_of_points);
        }

        let mut dot_product = simd.reduce_sum_f32s(sum_of_points);

        dot_product += first_tail
            .iter()
            .zip(second_tail)
            .map(|(&x, &y)| x * y)
            .sum::<f32>();
        dot_product
    }
}

/// Plain dot product; larger means more similar.
#[tracing::instrument(skip_all)]
pub fn dot_product(first: &[f32], second: &[f32]) -> f32 {
    debug_assert_eq!(first.len(), second.len(), "vectors must have equal length");

    let arch = Arch::new();
    arch.dispatch(DotProduct { first, second })
}

struct EuclideanDistance<'a> {
    first: &'a [f32],
    second: &'a [f32],
}

impl WithSimd for EuclideanDistance<'_> {
    type Output = f32;

    #[inline(always)]
    fn with_simd<S: Simd>(self, simd: S) -> Self::Output {
        let (first_head, first_tail) = S::as_simd_f32s(self.first);
        let (second_head, second_tail) = S::as_simd_f32s(self.second);

        let mut sum_of_squares = simd.splat_f32s(0.0);

        for (&cord_first, &cord_second) in first_head.iter().zip(second_head) {
            let diff = simd.sub_f32s(cord_first, cord_second);
            sum_of_squares = simd.mul_add_f32s(diff, diff, sum_of_squares);
        }

        let mut total = simd.reduce_sum_f32s(sum_of_squares);

        total += first_tail
            .iter()
            .zip(second_tail)
            .map(|(&x, &y)| {
                let diff = x - y;
                diff * diff
            })
            .sum::<f32>();

        total.sqrt()
    }
}

/// Euclidean (L2) distance; smaller means more similar.
#[tracing::instrument(skip_all)]
pub fn euclidean_distance(first: &[f32], second: &[f32]) -> f32 {
    debug_assert_eq!(first.len(), second.len(), "vectors must have equal length");

    let arch = Arch::new();
    arch.dispatch(EuclideanDistance { first, second })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_identical_vectors_is_zero() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!(euclidean_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn l2_orthonormal_axes() {
        let a = [1.0, 0.0, 0.0, 0.0];
        let b = [0.0, 1.0, 0.0, 0.0];
        assert!((euclidean_distance(&a, &b) - std::f32::consts::SQRT_2).abs() < 1e-5);
    }

    #[test]
    fn cosine_opposite_vectors() {
        let a = [1.0, 0.0, 0.0, 0.0];
        let b = [-1.0, 0.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        let a = [0.0, 0.0, 0.0, 0.0];
        let b = [1.0, 0.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn dot_product_basic() {
        let a = [1.0, 2.0, 0.0, 0.0];
        let b = [3.0, 4.0, 0.0, 0.0];
        assert!((dot_product(&a, &b) - 11.0).abs() < 1e-6);
    }

    #[test]
    fn metric_is_better_directions() {
        assert!(Metric::L2.is_better(1.0, 2.0));
        assert!(!Metric::L2.is_better(2.0, 1.0));
        assert!(Metric::Cosine.is_better(0.9, 0.1));
        assert!(Metric::Dot.is_better(5.0, 1.0));
    }

    #[test]
    fn metric_rank_normalizes_to_smaller_is_better() {
        assert!(Metric::L2.rank(1.0) < Metric::L2.rank(2.0));
        assert!(Metric::Cosine.rank(0.9) < Metric::Cosine.rank(0.1));
    }

    #[test]
    fn metric_codes_roundtrip() {
        for m in [Metric::L2, Metric::Cosine, Metric::Dot] {
            assert_eq!(Metric::from_code(m.code()), Some(m));
        }
    }
}
