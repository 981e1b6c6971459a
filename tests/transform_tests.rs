//! Transform Algorithm Tests
//!
//! Tests for:
//! - Local <-> skeleton-space round trips
//! - Translate/rotate/scale decomposition and reconstruction
//! - Batch decomposition with singular elements
//! - Joint extents

use glam::{DMat4, DQuat, DVec3, Quat, Vec3};

use myth_skel::errors::SkelError;
use myth_skel::skel::transforms::invert_transforms;
use myth_skel::skel::{
    Topology, compute_joint_local_transforms, compute_joint_local_transforms_with_inverses,
    compute_joints_extent, concat_joint_transforms_vec, decompose_transform, decompose_transforms,
    make_transform, make_transforms,
};

const EPSILON: f64 = 1e-6;

fn max_diff(a: &DMat4, b: &DMat4) -> f64 {
    (*a - *b)
        .to_cols_array()
        .iter()
        .fold(0.0, |acc, v| acc.max(v.abs()))
}

fn approx_vec3(a: Vec3, b: Vec3) -> bool {
    (a - b).abs().max_element() < 1e-5
}

fn chain() -> (Topology, Vec<DMat4>) {
    let topology = Topology::from_parent_indices(vec![-1, 0, 1, 0]).expect("valid");
    let local = vec![
        DMat4::from_scale_rotation_translation(
            DVec3::splat(2.0),
            DQuat::from_rotation_z(0.3),
            DVec3::new(1.0, 2.0, 3.0),
        ),
        DMat4::from_rotation_translation(DQuat::from_rotation_x(-0.8), DVec3::Y),
        DMat4::from_scale_rotation_translation(
            DVec3::new(1.0, 0.5, 1.5),
            DQuat::from_rotation_y(1.1),
            DVec3::new(0.0, 0.0, -2.0),
        ),
        DMat4::from_translation(DVec3::new(-1.0, 0.0, 0.0)),
    ];
    (topology, local)
}

// ============================================================================
// Local <-> skeleton space
// ============================================================================

#[test]
fn local_transforms_round_trip() {
    let (topology, local) = chain();
    let skel = concat_joint_transforms_vec(&topology, &local, None).expect("concat");

    let mut recovered = vec![DMat4::IDENTITY; local.len()];
    compute_joint_local_transforms(&topology, &skel, &mut recovered, None).expect("local");
    for (a, b) in recovered.iter().zip(&local) {
        assert!(max_diff(a, b) < EPSILON);
    }
}

#[test]
fn local_transforms_round_trip_under_root() {
    let (topology, local) = chain();
    let root = DMat4::from_rotation_translation(DQuat::from_rotation_y(0.5), DVec3::new(4.0, 0.0, 0.0));
    let skel = concat_joint_transforms_vec(&topology, &local, Some(&root)).expect("concat");

    let inverses = invert_transforms(&skel, true);
    let root_inverse = root.inverse();
    let mut recovered = vec![DMat4::IDENTITY; local.len()];
    compute_joint_local_transforms_with_inverses(
        &topology,
        &skel,
        &inverses,
        &mut recovered,
        Some(&root_inverse),
    )
    .expect("local");
    for (a, b) in recovered.iter().zip(&local) {
        assert!(max_diff(a, b) < EPSILON);
    }
}

#[test]
fn local_transforms_reject_short_output() {
    let (topology, local) = chain();
    let mut out = vec![DMat4::IDENTITY; 2];
    let err = compute_joint_local_transforms(&topology, &local, &mut out, None).unwrap_err();
    assert!(matches!(err, SkelError::SizeMismatch { .. }));
}

// ============================================================================
// Decomposition
// ============================================================================

#[test]
fn decompose_then_make_reproduces_matrix() {
    let rotation = Quat::from_rotation_y(0.7) * Quat::from_rotation_x(-0.3);
    let xf = make_transform(Vec3::new(1.0, -2.0, 4.0), rotation, Vec3::new(2.0, 0.5, 3.0));

    let (t, r, s) = decompose_transform(&xf).expect("decompose");
    assert!(approx_vec3(t, Vec3::new(1.0, -2.0, 4.0)));
    assert!(approx_vec3(s, Vec3::new(2.0, 0.5, 3.0)));
    assert!(max_diff(&make_transform(t, r, s), &xf) < 1e-5);
}

#[test]
fn mirrored_transform_folds_flip_into_scale() {
    let xf = DMat4::from_scale(DVec3::new(-1.0, 1.0, 1.0));
    let (t, r, s) = decompose_transform(&xf).expect("decompose");
    assert!(max_diff(&make_transform(t, r, s), &xf) < 1e-5);
}

#[test]
fn singular_transform_fails() {
    let xf = DMat4::from_scale(DVec3::new(1.0, 0.0, 1.0));
    assert_eq!(
        decompose_transform(&xf).unwrap_err(),
        SkelError::SingularTransform { index: 0 }
    );
}

#[test]
fn batch_decomposition_continues_past_singular_element() {
    let xforms = [
        DMat4::from_translation(DVec3::X),
        DMat4::ZERO,
        DMat4::from_translation(DVec3::Z),
    ];
    let mut t = vec![Vec3::ZERO; 3];
    let mut r = vec![Quat::IDENTITY; 3];
    let mut s = vec![Vec3::ZERO; 3];

    let err = decompose_transforms(&xforms, &mut t, &mut r, &mut s).unwrap_err();
    assert_eq!(err, SkelError::SingularTransform { index: 1 });
    assert!(approx_vec3(t[0], Vec3::X));
    assert!(approx_vec3(t[2], Vec3::Z));
    assert_eq!(s[1], Vec3::ONE);
    assert_eq!(r[1], Quat::IDENTITY);
}

#[test]
fn make_transforms_checks_sizes() {
    let mut out = vec![DMat4::ZERO; 2];
    let err = make_transforms(&[Vec3::ZERO; 2], &[Quat::IDENTITY; 1], &[Vec3::ONE; 2], &mut out)
        .unwrap_err();
    assert!(matches!(err, SkelError::SizeMismatch { .. }));

    make_transforms(&[Vec3::X; 2], &[Quat::IDENTITY; 2], &[Vec3::ONE; 2], &mut out).expect("make");
    assert_eq!(out[1], DMat4::from_translation(DVec3::X));
}

// ============================================================================
// Extent
// ============================================================================

#[test]
fn extent_covers_padded_pivots() {
    let xforms = [
        DMat4::from_translation(DVec3::new(-1.0, 0.0, 0.0)),
        DMat4::from_translation(DVec3::new(2.0, 3.0, -4.0)),
    ];
    let bounds = compute_joints_extent(&xforms, 0.5, None);
    assert!(approx_vec3(bounds.min, Vec3::new(-1.5, -0.5, -4.5)));
    assert!(approx_vec3(bounds.max, Vec3::new(2.5, 3.5, 0.5)));
}

#[test]
fn extent_of_no_joints_is_empty() {
    assert!(compute_joints_extent(&[], 1.0, None).is_empty());
}
