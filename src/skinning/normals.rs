//! Normal skinning.
//!
//! Normals are deformed by the inverse transpose of each joint's upper 3x3
//! block (see [`crate::math::normal_matrix`]), blended the same way as points
//! and renormalized. For face-varying normals the influences are read from
//! the point each face vertex refers to.

use glam::{DMat3, DQuat, DVec3, Vec2, Vec3};

use super::SkinningMethod;
use super::influences::{
    FaceVaryingPointIndex, IdentityPointIndex, Influences, InterleavedInfluences, PointIndex,
    SeparateInfluences, validate_array_shape, validate_joint_indices,
};
use super::points::{check_point_influences, pivot_joint_index};
use crate::errors::{Result, SkelError};
use crate::math::{IDENTITY_TOLERANCE, mat3_is_close, orthonormalize};
use crate::utils::parallel::for_each_chunk_mut;

/// Skins per-point normals in place.
///
/// `geom_bind` and `joint_xforms` are inverse-transpose 3x3 matrices of the
/// geom bind and skinning transforms.
pub fn skin_normals(
    method: SkinningMethod,
    geom_bind: &DMat3,
    joint_xforms: &[DMat3],
    joint_indices: &[i32],
    joint_weights: &[f32],
    num_influences: usize,
    normals: &mut [Vec3],
    in_serial: bool,
) -> Result<()> {
    let influences = SeparateInfluences::new(joint_indices, joint_weights)?;
    check_point_influences(influences.len(), normals.len(), num_influences)?;
    skin_normals_with(
        method,
        geom_bind,
        joint_xforms,
        &influences,
        &IdentityPointIndex,
        num_influences,
        normals,
        in_serial,
    )
}

/// [`skin_normals`] with interleaved `(index, weight)` influences.
pub fn skin_normals_interleaved(
    method: SkinningMethod,
    geom_bind: &DMat3,
    joint_xforms: &[DMat3],
    influences: &[Vec2],
    num_influences: usize,
    normals: &mut [Vec3],
    in_serial: bool,
) -> Result<()> {
    check_point_influences(influences.len(), normals.len(), num_influences)?;
    skin_normals_with(
        method,
        geom_bind,
        joint_xforms,
        &InterleavedInfluences::new(influences),
        &IdentityPointIndex,
        num_influences,
        normals,
        in_serial,
    )
}

/// Linear blend shorthand for [`skin_normals`].
pub fn skin_normals_lbs(
    geom_bind: &DMat3,
    joint_xforms: &[DMat3],
    joint_indices: &[i32],
    joint_weights: &[f32],
    num_influences: usize,
    normals: &mut [Vec3],
    in_serial: bool,
) -> Result<()> {
    skin_normals(
        SkinningMethod::ClassicLinear,
        geom_bind,
        joint_xforms,
        joint_indices,
        joint_weights,
        num_influences,
        normals,
        in_serial,
    )
}

/// Skins face-varying normals in place.
///
/// Normal `i` takes the influences of point `face_vertex_indices[i]`. The
/// number of points is implied by the influence arrays. A face vertex index
/// outside that range is reported and falls back to point 0.
pub fn skin_face_varying_normals(
    method: SkinningMethod,
    geom_bind: &DMat3,
    joint_xforms: &[DMat3],
    joint_indices: &[i32],
    joint_weights: &[f32],
    num_influences: usize,
    face_vertex_indices: &[i32],
    normals: &mut [Vec3],
    in_serial: bool,
) -> Result<()> {
    let influences = SeparateInfluences::new(joint_indices, joint_weights)?;
    validate_array_shape(influences.len(), num_influences)?;
    SkelError::check_size(
        "faceVertexIndices",
        face_vertex_indices.len(),
        "normals",
        normals.len(),
    )?;

    let num_points = influences.len() / num_influences;
    if num_points == 0 && !normals.is_empty() {
        return Err(SkelError::SizeMismatch {
            what: "jointIndices",
            actual: 0,
            expected_what: "at least one point of influences",
            expected: num_influences,
        }
        .warn());
    }

    let point_index = FaceVaryingPointIndex {
        face_vertex_indices,
        num_points,
    };
    skin_normals_with(
        method,
        geom_bind,
        joint_xforms,
        &influences,
        &point_index,
        num_influences,
        normals,
        in_serial,
    )
}

/// Linear blend shorthand for [`skin_face_varying_normals`].
pub fn skin_face_varying_normals_lbs(
    geom_bind: &DMat3,
    joint_xforms: &[DMat3],
    joint_indices: &[i32],
    joint_weights: &[f32],
    num_influences: usize,
    face_vertex_indices: &[i32],
    normals: &mut [Vec3],
    in_serial: bool,
) -> Result<()> {
    skin_face_varying_normals(
        SkinningMethod::ClassicLinear,
        geom_bind,
        joint_xforms,
        joint_indices,
        joint_weights,
        num_influences,
        face_vertex_indices,
        normals,
        in_serial,
    )
}

fn skin_normals_with<I: Influences, P: PointIndex>(
    method: SkinningMethod,
    geom_bind: &DMat3,
    joint_xforms: &[DMat3],
    influences: &I,
    point_index: &P,
    n: usize,
    normals: &mut [Vec3],
    in_serial: bool,
) -> Result<()> {
    validate_joint_indices(influences, joint_xforms.len())?;
    match method {
        SkinningMethod::ClassicLinear => {
            skin_normals_lbs_kernel(geom_bind, joint_xforms, influences, point_index, n, normals, in_serial);
        }
        SkinningMethod::DualQuaternion => {
            skin_normals_dqs_kernel(geom_bind, joint_xforms, influences, point_index, n, normals, in_serial);
        }
    }
    Ok(())
}

// ============================================================================
// Kernels
// ============================================================================

fn skin_normals_lbs_kernel<I: Influences, P: PointIndex>(
    geom_bind: &DMat3,
    joint_xforms: &[DMat3],
    influences: &I,
    point_index: &P,
    n: usize,
    normals: &mut [Vec3],
    in_serial: bool,
) {
    for_each_chunk_mut(normals, in_serial, |start, chunk| {
        for (offset, normal) in chunk.iter_mut().enumerate() {
            let initial = *geom_bind * normal.as_dvec3();
            let pi = point_index.point_index(start + offset);

            let mut result = DVec3::ZERO;
            for k in pi * n..(pi + 1) * n {
                let w = influences.weight(k);
                if w != 0.0 {
                    let joint = influences.joint_index(k) as usize;
                    result += joint_xforms[joint] * initial * f64::from(w);
                }
            }
            *normal = result.normalize_or_zero().as_vec3();
        }
    });
}

fn skin_normals_dqs_kernel<I: Influences, P: PointIndex>(
    geom_bind: &DMat3,
    joint_xforms: &[DMat3],
    influences: &I,
    point_index: &P,
    n: usize,
    normals: &mut [Vec3],
    in_serial: bool,
) {
    let (joint_quats, joint_scales, has_scale) = convert_to_quaternions(joint_xforms);
    let zero = DQuat::from_xyzw(0.0, 0.0, 0.0, 0.0);

    for_each_chunk_mut(normals, in_serial, |start, chunk| {
        for (offset, normal) in chunk.iter_mut().enumerate() {
            let initial = *geom_bind * normal.as_dvec3();
            let pi = point_index.point_index(start + offset);

            let pivot = pivot_joint_index(influences, pi, n).map_or(zero, |j| joint_quats[j]);

            let mut scaled = DVec3::ZERO;
            let mut sum = zero;
            for k in pi * n..(pi + 1) * n {
                let mut w = f64::from(influences.weight(k));
                if w == 0.0 {
                    continue;
                }
                let joint = influences.joint_index(k) as usize;
                if has_scale {
                    scaled += joint_scales[joint] * initial * w;
                }
                let q = joint_quats[joint];
                if q.dot(pivot) < 0.0 {
                    w = -w;
                }
                sum = sum + q * w;
            }
            if !has_scale {
                scaled = initial;
            }

            let length = sum.length();
            *normal = if length > 0.0 {
                ((sum / length).mul_vec3(scaled)).normalize_or_zero().as_vec3()
            } else {
                Vec3::ZERO
            };
        }
    });
}

/// Splits each 3x3 joint matrix into a rotation quaternion and a residual
/// scale, `m = rotation * scale`. Singular matrices become a zero quaternion
/// with identity scale.
fn convert_to_quaternions(joint_xforms: &[DMat3]) -> (Vec<DQuat>, Vec<DMat3>, bool) {
    let mut quats = Vec::with_capacity(joint_xforms.len());
    let mut scales = Vec::with_capacity(joint_xforms.len());
    let mut has_scale = false;

    for m in joint_xforms {
        let sign = m.determinant().signum();
        let Some(rotation) = orthonormalize(&(*m * sign)) else {
            quats.push(DQuat::from_xyzw(0.0, 0.0, 0.0, 0.0));
            scales.push(DMat3::IDENTITY);
            continue;
        };
        quats.push(DQuat::from_mat3(&rotation).normalize());

        let scale = rotation.transpose() * *m;
        has_scale |= !mat3_is_close(&scale, &DMat3::IDENTITY, IDENTITY_TOLERANCE);
        scales.push(scale);
    }
    (quats, scales, has_scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_splits_without_scale() {
        let m = DMat3::from_rotation_z(0.5);
        let (quats, scales, has_scale) = convert_to_quaternions(&[m]);
        assert!(!has_scale);
        assert!(mat3_is_close(&scales[0], &DMat3::IDENTITY, 1e-9));
        assert!((quats[0].mul_vec3(DVec3::X) - m * DVec3::X).length() < 1e-9);
    }

    #[test]
    fn face_vertex_index_out_of_range_uses_point_zero() {
        let rot = DMat3::from_rotation_z(std::f64::consts::FRAC_PI_2);
        let mut normals = vec![Vec3::X, Vec3::X];
        skin_face_varying_normals_lbs(
            &DMat3::IDENTITY,
            &[rot, DMat3::IDENTITY],
            &[0, 1],
            &[1.0, 1.0],
            1,
            &[1, 7],
            &mut normals,
            true,
        )
        .expect("valid influences");
        assert!((normals[0] - Vec3::X).length() < 1e-6);
        assert!((normals[1] - Vec3::Y).length() < 1e-6);
    }
}
