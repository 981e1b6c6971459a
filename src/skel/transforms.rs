//! 关节变换算法 (Joint Transform Algorithms)
//!
//! Stateless functions over flat transform arrays ordered by a [`Topology`]:
//! local → skeleton-space composition, the inverse decomposition, and
//! translate/rotate/scale factoring.
//!
//! Composition relies on parents preceding children, so both directions are
//! a single forward pass without recursion or scratch storage. The ordering
//! is re-checked on every call; a violation fails the call before any
//! out-of-bounds read can happen.

use glam::{DMat3, DMat4, Quat, Vec3};

use super::topology::{Topology, check_parent};
use crate::errors::{Result, SkelError};
use crate::math::{BoundingBox, factor_transform};
use crate::utils::parallel::for_each_chunk_mut;

// ============================================================================
// Hierarchy composition
// ============================================================================

/// Composes joint-local transforms into skeleton space.
///
/// `xforms[i] = xforms[parent] * local[i]`; roots are placed under
/// `root_xform` when given.
pub fn concat_joint_transforms(
    topology: &Topology,
    joint_local_xforms: &[DMat4],
    xforms: &mut [DMat4],
    root_xform: Option<&DMat4>,
) -> Result<()> {
    SkelError::check_size(
        "jointLocalXforms",
        joint_local_xforms.len(),
        "number of joints",
        topology.len(),
    )?;
    SkelError::check_size("xforms", xforms.len(), "number of joints", topology.len())?;

    for i in 0..topology.len() {
        let local = joint_local_xforms[i];
        xforms[i] = match check_parent(i, topology.parent(i))? {
            Some(parent) => xforms[parent] * local,
            None => match root_xform {
                Some(root) => *root * local,
                None => local,
            },
        };
    }
    Ok(())
}

/// Allocating form of [`concat_joint_transforms`].
pub fn concat_joint_transforms_vec(
    topology: &Topology,
    joint_local_xforms: &[DMat4],
    root_xform: Option<&DMat4>,
) -> Result<Vec<DMat4>> {
    let mut xforms = vec![DMat4::IDENTITY; topology.len()];
    concat_joint_transforms(topology, joint_local_xforms, &mut xforms, root_xform)?;
    Ok(xforms)
}

/// Recovers joint-local transforms from skeleton-space transforms and their
/// inverses: `local[i] = inverse[parent] * xforms[i]`.
pub fn compute_joint_local_transforms_with_inverses(
    topology: &Topology,
    xforms: &[DMat4],
    inverse_xforms: &[DMat4],
    joint_local_xforms: &mut [DMat4],
    root_inverse_xform: Option<&DMat4>,
) -> Result<()> {
    SkelError::check_size("xforms", xforms.len(), "number of joints", topology.len())?;
    SkelError::check_size(
        "inverseXforms",
        inverse_xforms.len(),
        "number of joints",
        topology.len(),
    )?;
    SkelError::check_size(
        "jointLocalXforms",
        joint_local_xforms.len(),
        "number of joints",
        topology.len(),
    )?;

    for i in 0..topology.len() {
        let xform = xforms[i];
        joint_local_xforms[i] = match check_parent(i, topology.parent(i))? {
            Some(parent) => inverse_xforms[parent] * xform,
            None => match root_inverse_xform {
                Some(root_inv) => *root_inv * xform,
                None => xform,
            },
        };
    }
    Ok(())
}

/// Like [`compute_joint_local_transforms_with_inverses`], inverting
/// `xforms` internally.
pub fn compute_joint_local_transforms(
    topology: &Topology,
    xforms: &[DMat4],
    joint_local_xforms: &mut [DMat4],
    root_inverse_xform: Option<&DMat4>,
) -> Result<()> {
    let inverse_xforms = invert_transforms(xforms, false);
    compute_joint_local_transforms_with_inverses(
        topology,
        xforms,
        &inverse_xforms,
        joint_local_xforms,
        root_inverse_xform,
    )
}

/// Inverts every transform. Elements are independent, so large arrays are
/// inverted in parallel.
#[must_use]
pub fn invert_transforms(xforms: &[DMat4], in_serial: bool) -> Vec<DMat4> {
    let mut inverses = vec![DMat4::IDENTITY; xforms.len()];
    for_each_chunk_mut(&mut inverses, in_serial, |start, chunk| {
        for (out, xf) in chunk.iter_mut().zip(&xforms[start..]) {
            *out = xf.inverse();
        }
    });
    inverses
}

// ============================================================================
// Translate / rotate / scale
// ============================================================================

/// Factors `xform` into translation, rotation and scale.
pub fn decompose_transform(xform: &DMat4) -> Result<(Vec3, Quat, Vec3)> {
    decompose_one(xform).ok_or_else(|| SkelError::SingularTransform { index: 0 }.warn())
}

fn decompose_one(xform: &DMat4) -> Option<(Vec3, Quat, Vec3)> {
    let f = factor_transform(xform)?;
    Some((
        f.translation.as_vec3(),
        glam::DQuat::from_mat3(&f.rotation).as_quat(),
        f.scale.as_vec3(),
    ))
}

/// Factors every transform of a batch.
///
/// Elements are independent: a singular transform is reported, its
/// components are reset to identity, and the rest of the batch is still
/// decomposed. The returned error names the first failed element.
pub fn decompose_transforms(
    xforms: &[DMat4],
    translations: &mut [Vec3],
    rotations: &mut [Quat],
    scales: &mut [Vec3],
) -> Result<()> {
    SkelError::check_size("translations", translations.len(), "xforms", xforms.len())?;
    SkelError::check_size("rotations", rotations.len(), "xforms", xforms.len())?;
    SkelError::check_size("scales", scales.len(), "xforms", xforms.len())?;

    let mut factored: Vec<Option<(Vec3, Quat, Vec3)>> = vec![None; xforms.len()];
    for_each_chunk_mut(&mut factored, false, |start, chunk| {
        for (out, xf) in chunk.iter_mut().zip(&xforms[start..]) {
            *out = decompose_one(xf);
        }
    });

    let mut first_failure = None;
    for (i, components) in factored.into_iter().enumerate() {
        let (t, r, s) = components.unwrap_or_else(|| {
            let err = SkelError::SingularTransform { index: i }.warn();
            first_failure.get_or_insert(err);
            (Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)
        });
        translations[i] = t;
        rotations[i] = r;
        scales[i] = s;
    }
    first_failure.map_or(Ok(()), Err)
}

/// Builds `translate * rotate * scale` (scale applied first).
#[inline]
#[must_use]
pub fn make_transform(translation: Vec3, rotation: Quat, scale: Vec3) -> DMat4 {
    DMat4::from_scale_rotation_translation(
        scale.as_dvec3(),
        rotation.as_dquat(),
        translation.as_dvec3(),
    )
}

/// [`make_transform`] with the rotation given as a matrix.
#[must_use]
pub fn make_transform_from_matrix(translation: Vec3, rotation: &DMat3, scale: Vec3) -> DMat4 {
    let s = scale.as_dvec3();
    DMat4::from_cols(
        (rotation.x_axis * s.x).extend(0.0),
        (rotation.y_axis * s.y).extend(0.0),
        (rotation.z_axis * s.z).extend(0.0),
        translation.as_dvec3().extend(1.0),
    )
}

/// Builds a transform per element. All arrays must be the same size.
pub fn make_transforms(
    translations: &[Vec3],
    rotations: &[Quat],
    scales: &[Vec3],
    xforms: &mut [DMat4],
) -> Result<()> {
    SkelError::check_size("translations", translations.len(), "xforms", xforms.len())?;
    SkelError::check_size("rotations", rotations.len(), "xforms", xforms.len())?;
    SkelError::check_size("scales", scales.len(), "xforms", xforms.len())?;

    for (i, xf) in xforms.iter_mut().enumerate() {
        *xf = make_transform(translations[i], rotations[i], scales[i]);
    }
    Ok(())
}

// ============================================================================
// Extent
// ============================================================================

/// Bounds of the joint pivots (the translation of each transform), moved by
/// `root_xform` when given and padded by `pad` on every side.
#[must_use]
pub fn compute_joints_extent(xforms: &[DMat4], pad: f32, root_xform: Option<&DMat4>) -> BoundingBox {
    let mut bounds = BoundingBox::EMPTY;
    for xf in xforms {
        let pivot = xf.w_axis.truncate();
        let pivot = match root_xform {
            Some(root) => root.transform_point3(pivot),
            None => pivot,
        };
        bounds.extend(pivot.as_vec3());
    }
    bounds.padded(pad)
}
