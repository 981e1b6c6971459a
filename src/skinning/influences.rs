//! Joint influence accessors and maintenance.
//!
//! An influence is a `(joint index, weight)` pair. Each skinned component
//! (point, normal, or the whole prim for rigid bindings) owns a fixed-size
//! set of `num_influences` consecutive influences.

use glam::Vec2;
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::errors::{Result, SkelError};
use crate::utils::parallel::{PARALLEL_GRAIN_SIZE, for_each_group_chunk_mut, for_each_group_pair_mut};

/// Weight sums at or below this magnitude normalize to an all-zero set.
pub const DEFAULT_NORMALIZE_EPSILON: f32 = f32::EPSILON;

// ============================================================================
// Accessors
// ============================================================================

/// Read access to a flat influence array.
pub trait Influences: Sync {
    fn joint_index(&self, i: usize) -> i32;
    fn weight(&self, i: usize) -> f32;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Indices and weights held in two parallel arrays.
#[derive(Debug, Clone, Copy)]
pub struct SeparateInfluences<'a> {
    pub indices: &'a [i32],
    pub weights: &'a [f32],
}

impl<'a> SeparateInfluences<'a> {
    /// Pairs `indices` with `weights`, failing if their sizes differ.
    pub fn new(indices: &'a [i32], weights: &'a [f32]) -> Result<Self> {
        SkelError::check_size("jointIndices", indices.len(), "jointWeights", weights.len())?;
        Ok(Self { indices, weights })
    }
}

impl Influences for SeparateInfluences<'_> {
    #[inline]
    fn joint_index(&self, i: usize) -> i32 {
        self.indices[i]
    }

    #[inline]
    fn weight(&self, i: usize) -> f32 {
        self.weights[i]
    }

    #[inline]
    fn len(&self) -> usize {
        self.indices.len()
    }
}

/// `(index, weight)` pairs packed into one array, index stored as a float.
#[derive(Debug, Clone, Copy)]
pub struct InterleavedInfluences<'a> {
    pub influences: &'a [Vec2],
}

impl<'a> InterleavedInfluences<'a> {
    #[must_use]
    pub fn new(influences: &'a [Vec2]) -> Self {
        Self { influences }
    }
}

impl Influences for InterleavedInfluences<'_> {
    #[inline]
    fn joint_index(&self, i: usize) -> i32 {
        self.influences[i].x as i32
    }

    #[inline]
    fn weight(&self, i: usize) -> f32 {
        self.influences[i].y
    }

    #[inline]
    fn len(&self) -> usize {
        self.influences.len()
    }
}

/// Maps a deformed element to the point that owns its influences.
pub trait PointIndex: Sync {
    fn point_index(&self, i: usize) -> usize;
}

/// Vertex and varying data: element `i` is point `i`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPointIndex;

impl PointIndex for IdentityPointIndex {
    #[inline]
    fn point_index(&self, i: usize) -> usize {
        i
    }
}

/// Face-varying data: element `i` belongs to point `face_vertex_indices[i]`.
#[derive(Debug, Clone, Copy)]
pub struct FaceVaryingPointIndex<'a> {
    pub face_vertex_indices: &'a [i32],
    pub num_points: usize,
}

impl PointIndex for FaceVaryingPointIndex<'_> {
    fn point_index(&self, i: usize) -> usize {
        let index = self.face_vertex_indices[i];
        match usize::try_from(index) {
            Ok(p) if p < self.num_points => p,
            _ => {
                log::warn!("faceVertexIndices is out of range [{index}] at index [{i}]");
                0
            }
        }
    }
}

/// Checks every joint index against `num_joints`.
///
/// One corrupt index usually means the whole influence set is out of sync
/// with the skeleton, so the first bad index fails the call.
pub fn validate_joint_indices<I: Influences>(influences: &I, num_joints: usize) -> Result<()> {
    let is_bad = |i: usize| {
        let j = influences.joint_index(i);
        j < 0 || j as usize >= num_joints
    };
    let len = influences.len();
    let found = if len < PARALLEL_GRAIN_SIZE {
        (0..len).find(|&i| is_bad(i))
    } else {
        (0..len).into_par_iter().find_first(|&i| is_bad(i))
    };
    match found {
        Some(at) => Err(SkelError::JointIndexOutOfRange {
            index: influences.joint_index(at),
            at,
            num_joints,
        }
        .warn()),
        None => Ok(()),
    }
}

/// Checks that `size` is a whole number of influence sets.
pub fn validate_array_shape(size: usize, num_influences: usize) -> Result<()> {
    if num_influences == 0 {
        return Err(SkelError::InvalidInfluenceCount(num_influences).warn());
    }
    if size % num_influences != 0 {
        return Err(SkelError::InfluenceShape {
            size,
            num_influences,
        }
        .warn());
    }
    Ok(())
}

// ============================================================================
// Maintenance
// ============================================================================

/// Scales each influence set so its weights sum to one. Sets whose sum is
/// within `eps` of zero are zeroed instead.
pub fn normalize_weights(weights: &mut [f32], num_influences: usize, eps: f32) -> Result<()> {
    validate_array_shape(weights.len(), num_influences)?;

    for_each_group_chunk_mut(weights, num_influences, false, |_, chunk| {
        for set in chunk.chunks_mut(num_influences) {
            let sum: f32 = set.iter().sum();
            if sum.abs() > eps {
                set.iter_mut().for_each(|w| *w /= sum);
            } else {
                set.fill(0.0);
            }
        }
    });
    Ok(())
}

/// Sorts each influence set by descending weight. Ties are broken by
/// descending joint index.
pub fn sort_influences(indices: &mut [i32], weights: &mut [f32], num_influences: usize) -> Result<()> {
    SkelError::check_size("indices", indices.len(), "weights", weights.len())?;
    validate_array_shape(indices.len(), num_influences)?;

    if num_influences < 2 {
        return Ok(());
    }

    for_each_group_pair_mut(indices, weights, num_influences, false, |index_set, weight_set| {
        let mut pairs: SmallVec<[(f32, i32); 8]> = weight_set
            .iter()
            .copied()
            .zip(index_set.iter().copied())
            .collect();
        pairs.sort_by(|a, b| b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)));
        for (j, (w, i)) in pairs.into_iter().enumerate() {
            weight_set[j] = w;
            index_set[j] = i;
        }
    });
    Ok(())
}

/// Broadcasts a single (constant) influence set to `size` components.
pub fn expand_constant_influences_to_varying<T: Copy>(array: &mut Vec<T>, size: usize) {
    *array = array.repeat(size);
}

fn resize_influences<T: Copy>(
    array: &mut Vec<T>,
    src_num_influences: usize,
    new_num_influences: usize,
    fill: T,
) -> Result<()> {
    if src_num_influences == new_num_influences {
        return Ok(());
    }
    validate_array_shape(array.len(), src_num_influences)?;

    let num_components = array.len() / src_num_influences;
    if num_components == 0 {
        return Ok(());
    }

    if new_num_influences < src_num_influences {
        // Truncate in place; destination never overtakes the source.
        for i in 1..num_components {
            let src = i * src_num_influences;
            array.copy_within(src..src + new_num_influences, i * new_num_influences);
        }
        array.truncate(num_components * new_num_influences);
    } else {
        // Expand in place, walking components in reverse so no source set is
        // overwritten before it is moved.
        array.resize(num_components * new_num_influences, fill);
        for idx in (0..num_components).rev() {
            for j in (0..src_num_influences).rev() {
                array[idx * new_num_influences + j] = array[idx * src_num_influences + j];
            }
            array[idx * new_num_influences + src_num_influences..(idx + 1) * new_num_influences]
                .fill(fill);
        }
    }
    Ok(())
}

/// Changes the influence count of a joint index array. New slots hold 0.
pub fn resize_joint_indices(
    indices: &mut Vec<i32>,
    src_num_influences: usize,
    new_num_influences: usize,
) -> Result<()> {
    resize_influences(indices, src_num_influences, new_num_influences, 0)
}

/// Changes the influence count of a weight array. New slots hold 0; when
/// influences are dropped the remaining weights are renormalized.
pub fn resize_joint_weights(
    weights: &mut Vec<f32>,
    src_num_influences: usize,
    new_num_influences: usize,
) -> Result<()> {
    resize_influences(weights, src_num_influences, new_num_influences, 0.0)?;
    if new_num_influences < src_num_influences {
        normalize_weights(weights, new_num_influences, DEFAULT_NORMALIZE_EPSILON)?;
    }
    Ok(())
}

/// Packs parallel index and weight arrays into `(index, weight)` pairs.
pub fn interleave_influences(indices: &[i32], weights: &[f32], interleaved: &mut [Vec2]) -> Result<()> {
    SkelError::check_size("weights", weights.len(), "indices", indices.len())?;
    SkelError::check_size(
        "interleavedInfluences",
        interleaved.len(),
        "indices",
        indices.len(),
    )?;
    for ((out, &i), &w) in interleaved.iter_mut().zip(indices).zip(weights) {
        *out = Vec2::new(i as f32, w);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_grows_in_place() {
        let mut indices = vec![1, 2, 3, 4];
        resize_joint_indices(&mut indices, 2, 3).expect("shape");
        assert_eq!(indices, vec![1, 2, 0, 3, 4, 0]);
    }

    #[test]
    fn resize_truncation_renormalizes() {
        let mut weights = vec![0.5, 0.25, 0.25, 0.6, 0.2, 0.2];
        resize_joint_weights(&mut weights, 3, 2).expect("shape");
        assert_eq!(weights.len(), 4);
        assert!((weights[0] - 2.0 / 3.0).abs() < 1e-6);
        assert!((weights[1] - 1.0 / 3.0).abs() < 1e-6);
        assert!((weights[2] - 0.75).abs() < 1e-6);
        assert!((weights[3] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn expand_constant() {
        let mut weights = vec![0.25f32, 0.75];
        expand_constant_influences_to_varying(&mut weights, 3);
        assert_eq!(weights, vec![0.25, 0.75, 0.25, 0.75, 0.25, 0.75]);
        expand_constant_influences_to_varying(&mut weights, 0);
        assert!(weights.is_empty());
    }

    #[test]
    fn interleave_packs_pairs() {
        let mut out = vec![Vec2::ZERO; 2];
        interleave_influences(&[3, 7], &[0.25, 0.75], &mut out).expect("sizes");
        assert_eq!(out, vec![Vec2::new(3.0, 0.25), Vec2::new(7.0, 0.75)]);
        let interleaved = InterleavedInfluences::new(&out);
        assert_eq!(interleaved.joint_index(1), 7);
    }

    #[test]
    fn zero_influence_count_is_rejected() {
        assert_eq!(
            validate_array_shape(4, 0),
            Err(SkelError::InvalidInfluenceCount(0))
        );
        assert_eq!(
            validate_array_shape(5, 2),
            Err(SkelError::InfluenceShape { size: 5, num_influences: 2 })
        );
    }

    #[test]
    fn bad_joint_index_reported_with_position() {
        let inf = SeparateInfluences::new(&[0, 1, 9, 0], &[1.0; 4]).expect("sizes");
        assert_eq!(
            validate_joint_indices(&inf, 2),
            Err(SkelError::JointIndexOutOfRange { index: 9, at: 2, num_joints: 2 })
        );
    }
}
