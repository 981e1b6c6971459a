//! Blend shape application.

use glam::Vec3;

use crate::errors::{Result, SkelError};
use crate::utils::parallel::for_each_chunk_mut;

const ZERO_WEIGHT_TOLERANCE: f32 = 1e-6;

/// Checks that `offsets` (dense when `indices` is empty, otherwise paired
/// with `indices`) fit a mesh of `num_points` points.
pub fn validate_blend_shape(offsets: &[Vec3], indices: &[i32], num_points: usize) -> Result<()> {
    if indices.is_empty() {
        return SkelError::check_size("non-indexed offsets", offsets.len(), "points", num_points);
    }
    SkelError::check_size("indexed offsets", offsets.len(), "indices", indices.len())?;
    match indices
        .iter()
        .find(|&&i| !usize::try_from(i).is_ok_and(|i| i < num_points))
    {
        Some(&bad) => Err(SkelError::PointIndexOutOfRange {
            index: bad,
            num_points,
        }
        .warn()),
        None => Ok(()),
    }
}

/// Adds `weight * offsets` to `points`.
///
/// With empty `indices` the offsets are dense, one per point. Otherwise
/// `offsets[i]` applies to `points[indices[i]]`; every index is checked
/// before any point is moved. A weight within tolerance of zero is a no-op.
pub fn apply_blend_shape(weight: f32, offsets: &[Vec3], indices: &[i32], points: &mut [Vec3]) -> Result<()> {
    if weight.abs() <= ZERO_WEIGHT_TOLERANCE {
        return Ok(());
    }
    validate_blend_shape(offsets, indices, points.len())?;

    if indices.is_empty() {
        for_each_chunk_mut(points, false, |start, chunk| {
            for (p, offset) in chunk.iter_mut().zip(&offsets[start..]) {
                *p += *offset * weight;
            }
        });
        return Ok(());
    }

    // Indices may repeat, so the scatter stays serial.
    for (&i, offset) in indices.iter().zip(offsets) {
        points[i as usize] += *offset * weight;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_offsets_accumulate_on_repeats() {
        let mut points = vec![Vec3::ZERO; 3];
        apply_blend_shape(0.5, &[Vec3::X, Vec3::X], &[2, 2], &mut points).expect("valid");
        assert_eq!(points[2], Vec3::X);
        assert_eq!(points[0], Vec3::ZERO);
    }

    #[test]
    fn bad_point_index_leaves_points_untouched() {
        let mut points = vec![Vec3::ONE; 2];
        let err = apply_blend_shape(1.0, &[Vec3::X, Vec3::X], &[0, 5], &mut points);
        assert_eq!(err, Err(SkelError::PointIndexOutOfRange { index: 5, num_points: 2 }));
        assert_eq!(points, vec![Vec3::ONE; 2]);
    }

    #[test]
    fn zero_weight_skips_size_checks() {
        let mut points = vec![Vec3::ONE; 2];
        assert!(apply_blend_shape(0.0, &[Vec3::X], &[], &mut points).is_ok());
    }
}
