//! Point skinning: linear blend (LBS) and dual quaternion (DQS).

use glam::{DMat3, DMat4, DQuat, DVec3, Vec2, Vec3};

use super::SkinningMethod;
use super::influences::{
    Influences, InterleavedInfluences, SeparateInfluences, validate_joint_indices,
};
use crate::errors::{Result, SkelError};
use crate::math::{DualQuat, IDENTITY_TOLERANCE, factor_transform, mat3_is_close};
use crate::utils::parallel::for_each_chunk_mut;

// ============================================================================
// Public entry points
// ============================================================================

/// Skins `points` in place with separate index/weight arrays.
///
/// `joint_xforms` are skinning transforms (skeleton-space joint transform
/// times inverse bind). Each point owns `num_influences` consecutive
/// influences. Every joint index is validated before any point is written.
pub fn skin_points(
    method: SkinningMethod,
    geom_bind: &DMat4,
    joint_xforms: &[DMat4],
    joint_indices: &[i32],
    joint_weights: &[f32],
    num_influences: usize,
    points: &mut [Vec3],
    in_serial: bool,
) -> Result<()> {
    let influences = SeparateInfluences::new(joint_indices, joint_weights)?;
    skin_points_with(
        method,
        geom_bind,
        joint_xforms,
        &influences,
        num_influences,
        points,
        in_serial,
    )
}

/// [`skin_points`] with interleaved `(index, weight)` influences.
pub fn skin_points_interleaved(
    method: SkinningMethod,
    geom_bind: &DMat4,
    joint_xforms: &[DMat4],
    influences: &[Vec2],
    num_influences: usize,
    points: &mut [Vec3],
    in_serial: bool,
) -> Result<()> {
    skin_points_with(
        method,
        geom_bind,
        joint_xforms,
        &InterleavedInfluences::new(influences),
        num_influences,
        points,
        in_serial,
    )
}

/// Linear blend shorthand for [`skin_points`].
pub fn skin_points_lbs(
    geom_bind: &DMat4,
    joint_xforms: &[DMat4],
    joint_indices: &[i32],
    joint_weights: &[f32],
    num_influences: usize,
    points: &mut [Vec3],
    in_serial: bool,
) -> Result<()> {
    skin_points(
        SkinningMethod::ClassicLinear,
        geom_bind,
        joint_xforms,
        joint_indices,
        joint_weights,
        num_influences,
        points,
        in_serial,
    )
}

/// Shared checks and dispatch for both influence layouts.
pub(crate) fn skin_points_with<I: Influences>(
    method: SkinningMethod,
    geom_bind: &DMat4,
    joint_xforms: &[DMat4],
    influences: &I,
    num_influences: usize,
    points: &mut [Vec3],
    in_serial: bool,
) -> Result<()> {
    check_point_influences(influences.len(), points.len(), num_influences)?;
    validate_joint_indices(influences, joint_xforms.len())?;

    match method {
        SkinningMethod::ClassicLinear => {
            skin_points_lbs_kernel(geom_bind, joint_xforms, influences, num_influences, points, in_serial);
        }
        SkinningMethod::DualQuaternion => {
            skin_points_dqs_kernel(geom_bind, joint_xforms, influences, num_influences, points, in_serial);
        }
    }
    Ok(())
}

/// Every component must own exactly `num_influences` influences.
pub(crate) fn check_point_influences(
    num_influence_entries: usize,
    num_components: usize,
    num_influences: usize,
) -> Result<()> {
    if num_influences == 0 {
        return Err(SkelError::InvalidInfluenceCount(0).warn());
    }
    SkelError::check_size(
        "influences",
        num_influence_entries,
        "points * numInfluencesPerPoint",
        num_components * num_influences,
    )
}

// ============================================================================
// Kernels
// ============================================================================

fn skin_points_lbs_kernel<I: Influences>(
    geom_bind: &DMat4,
    joint_xforms: &[DMat4],
    influences: &I,
    n: usize,
    points: &mut [Vec3],
    in_serial: bool,
) {
    for_each_chunk_mut(points, in_serial, |start, chunk| {
        for (offset, point) in chunk.iter_mut().enumerate() {
            let pi = start + offset;
            let initial = geom_bind.transform_point3(point.as_dvec3());
            let mut p = DVec3::ZERO;
            for k in pi * n..(pi + 1) * n {
                let w = influences.weight(k);
                if w != 0.0 {
                    let joint = influences.joint_index(k) as usize;
                    p += joint_xforms[joint].transform_point3(initial) * f64::from(w);
                }
            }
            *point = p.as_vec3();
        }
    });
}

fn skin_points_dqs_kernel<I: Influences>(
    geom_bind: &DMat4,
    joint_xforms: &[DMat4],
    influences: &I,
    n: usize,
    points: &mut [Vec3],
    in_serial: bool,
) {
    let (joint_dqs, joint_scales, has_scale) = convert_to_dual_quaternions(joint_xforms);

    for_each_chunk_mut(points, in_serial, |start, chunk| {
        for (offset, point) in chunk.iter_mut().enumerate() {
            let pi = start + offset;
            let initial = geom_bind.transform_point3(point.as_dvec3());

            let pivot = pivot_joint_index(influences, pi, n)
                .map_or(DQuat::from_xyzw(0.0, 0.0, 0.0, 0.0), |j| joint_dqs[j].real);

            let mut scaled = DVec3::ZERO;
            let mut sum = DualQuat::ZERO;
            for k in pi * n..(pi + 1) * n {
                let mut w = f64::from(influences.weight(k));
                if w == 0.0 {
                    continue;
                }
                let joint = influences.joint_index(k) as usize;
                if has_scale {
                    scaled += joint_scales[joint] * initial * w;
                }
                let dq = joint_dqs[joint];
                if dq.real.dot(pivot) < 0.0 {
                    w = -w;
                }
                sum += dq * w;
            }
            if !has_scale {
                scaled = initial;
            }
            *point = sum.normalize().transform_point(scaled).as_vec3();
        }
    });
}

/// The joint carrying the largest weight of point `pi`.
///
/// The first influence seeds the pivot even when its weight is zero; a later
/// influence replaces it only with a strictly larger weight.
pub(crate) fn pivot_joint_index<I: Influences>(influences: &I, pi: usize, n: usize) -> Option<usize> {
    let mut pivot = None;
    let mut max_weight = -1.0f32;
    for k in pi * n..(pi + 1) * n {
        let w = influences.weight(k);
        if pivot.is_none() || max_weight < w {
            max_weight = w;
            pivot = Some(influences.joint_index(k) as usize);
        }
    }
    pivot
}

/// Splits each joint transform into a unit dual quaternion (rotation and
/// translation) and a residual 3x3 scale, such that
/// `xform = translate * rotate * scale`.
///
/// Transforms that cannot be factored become a zero dual quaternion with
/// identity scale. The flag reports whether any residual scale differs from
/// identity.
pub(crate) fn convert_to_dual_quaternions(joint_xforms: &[DMat4]) -> (Vec<DualQuat>, Vec<DMat3>, bool) {
    let mut dqs = Vec::with_capacity(joint_xforms.len());
    let mut scales = Vec::with_capacity(joint_xforms.len());
    let mut has_scale = false;

    for xform in joint_xforms {
        let Some(factored) = factor_transform(xform) else {
            dqs.push(DualQuat::ZERO);
            scales.push(DMat3::IDENTITY);
            continue;
        };
        let rotation = DQuat::from_mat3(&factored.rotation).normalize();
        dqs.push(DualQuat::from_rotation_translation(rotation, factored.translation));

        let scale = factored.rotation.transpose() * DMat3::from_mat4(*xform);
        has_scale |= !mat3_is_close(&scale, &DMat3::IDENTITY, IDENTITY_TOLERANCE);
        scales.push(scale);
    }
    (dqs, scales, has_scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pivot_prefers_first_on_ties() {
        let inf = SeparateInfluences::new(&[2, 5, 1], &[0.4, 0.4, 0.2]).expect("sizes");
        assert_eq!(pivot_joint_index(&inf, 0, 3), Some(2));
    }

    #[test]
    fn dual_quaternions_capture_scale() {
        let xforms = [
            DMat4::from_translation(DVec3::X),
            DMat4::from_scale(DVec3::new(2.0, 2.0, 2.0)),
        ];
        let (dqs, scales, has_scale) = convert_to_dual_quaternions(&xforms);
        assert!(has_scale);
        assert!((dqs[0].translation() - DVec3::X).length() < 1e-12);
        assert!(mat3_is_close(&scales[0], &DMat3::IDENTITY, 1e-9));
        assert!(mat3_is_close(&scales[1], &DMat3::from_diagonal(DVec3::splat(2.0)), 1e-9));
    }

    #[test]
    fn singular_joint_becomes_zero() {
        let (dqs, scales, has_scale) = convert_to_dual_quaternions(&[DMat4::ZERO]);
        assert_eq!(dqs[0], DualQuat::ZERO);
        assert_eq!(scales[0], DMat3::IDENTITY);
        assert!(!has_scale);
    }

    #[test]
    fn zero_influences_per_point_rejected() {
        let mut points = vec![Vec3::ZERO];
        let err = skin_points_lbs(&DMat4::IDENTITY, &[DMat4::IDENTITY], &[], &[], 0, &mut points, true);
        assert_eq!(err, Err(SkelError::InvalidInfluenceCount(0)));
    }
}
