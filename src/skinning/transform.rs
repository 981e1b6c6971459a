//! Rigid transform skinning.
//!
//! A transform is skinned by deforming a 4-point frame (the pivot and the
//! tips of its three basis vectors) like ordinary points, then rebuilding a
//! matrix from the deformed frame.

use glam::{DMat4, DVec3, Vec2};

use super::SkinningMethod;
use super::influences::{
    Influences, InterleavedInfluences, SeparateInfluences, validate_joint_indices,
};
use super::points::{convert_to_dual_quaternions, pivot_joint_index};
use crate::errors::{Result, SkelError};
use crate::math::DualQuat;

const FULL_WEIGHT_TOLERANCE: f32 = 1e-6;

/// Skins `geom_bind` by every influence in `joint_indices`/`joint_weights`.
///
/// All influences act on the single transform. Returns the skinned
/// transform; a bad joint index fails the call.
pub fn skin_transform(
    method: SkinningMethod,
    geom_bind: &DMat4,
    joint_xforms: &[DMat4],
    joint_indices: &[i32],
    joint_weights: &[f32],
) -> Result<DMat4> {
    let influences = SeparateInfluences::new(joint_indices, joint_weights)?;
    skin_transform_with(method, geom_bind, joint_xforms, &influences)
}

/// [`skin_transform`] with interleaved `(index, weight)` influences.
pub fn skin_transform_interleaved(
    method: SkinningMethod,
    geom_bind: &DMat4,
    joint_xforms: &[DMat4],
    influences: &[Vec2],
) -> Result<DMat4> {
    skin_transform_with(
        method,
        geom_bind,
        joint_xforms,
        &InterleavedInfluences::new(influences),
    )
}

/// Linear blend shorthand for [`skin_transform`].
pub fn skin_transform_lbs(
    geom_bind: &DMat4,
    joint_xforms: &[DMat4],
    joint_indices: &[i32],
    joint_weights: &[f32],
) -> Result<DMat4> {
    skin_transform(
        SkinningMethod::ClassicLinear,
        geom_bind,
        joint_xforms,
        joint_indices,
        joint_weights,
    )
}

fn skin_transform_with<I: Influences>(
    method: SkinningMethod,
    geom_bind: &DMat4,
    joint_xforms: &[DMat4],
    influences: &I,
) -> Result<DMat4> {
    // Rigidly bound to one joint.
    if influences.len() == 1 && (influences.weight(0) - 1.0).abs() <= FULL_WEIGHT_TOLERANCE {
        let joint = influences.joint_index(0);
        return match usize::try_from(joint) {
            Ok(j) if j < joint_xforms.len() => Ok(joint_xforms[j] * *geom_bind),
            _ => Err(SkelError::JointIndexOutOfRange {
                index: joint,
                at: 0,
                num_joints: joint_xforms.len(),
            }
            .warn()),
        };
    }

    validate_joint_indices(influences, joint_xforms.len())?;

    let pivot = geom_bind.w_axis.truncate();
    let frame = [
        pivot + geom_bind.x_axis.truncate(),
        pivot + geom_bind.y_axis.truncate(),
        pivot + geom_bind.z_axis.truncate(),
        pivot,
    ];

    let skinned = match method {
        SkinningMethod::ClassicLinear => frame_lbs(&frame, joint_xforms, influences),
        SkinningMethod::DualQuaternion => frame_dqs(&frame, joint_xforms, influences),
    };

    let origin = skinned[3];
    Ok(DMat4::from_cols(
        (skinned[0] - origin).extend(0.0),
        (skinned[1] - origin).extend(0.0),
        (skinned[2] - origin).extend(0.0),
        origin.extend(1.0),
    ))
}

fn frame_lbs<I: Influences>(frame: &[DVec3; 4], joint_xforms: &[DMat4], influences: &I) -> [DVec3; 4] {
    frame.map(|initial| {
        let mut p = DVec3::ZERO;
        for k in 0..influences.len() {
            let w = influences.weight(k);
            if w != 0.0 {
                let joint = influences.joint_index(k) as usize;
                p += joint_xforms[joint].transform_point3(initial) * f64::from(w);
            }
        }
        p
    })
}

fn frame_dqs<I: Influences>(frame: &[DVec3; 4], joint_xforms: &[DMat4], influences: &I) -> [DVec3; 4] {
    let (joint_dqs, joint_scales, has_scale) = convert_to_dual_quaternions(joint_xforms);
    let pivot = pivot_joint_index(influences, 0, influences.len())
        .map_or(DualQuat::ZERO.real, |j| joint_dqs[j].real);

    let mut scaled = [DVec3::ZERO; 4];
    let mut sum = DualQuat::ZERO;
    for k in 0..influences.len() {
        let mut w = f64::from(influences.weight(k));
        if w == 0.0 {
            continue;
        }
        let joint = influences.joint_index(k) as usize;
        if has_scale {
            for (out, initial) in scaled.iter_mut().zip(frame) {
                *out += joint_scales[joint] * *initial * w;
            }
        }
        let dq = joint_dqs[joint];
        if dq.real.dot(pivot) < 0.0 {
            w = -w;
        }
        sum += dq * w;
    }

    let sum = sum.normalize();
    let source = if has_scale { scaled } else { *frame };
    source.map(|p| sum.transform_point(p))
}
