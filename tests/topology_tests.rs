//! Topology Tests
//!
//! Tests for:
//! - Parent-index validation (self-parented, mis-ordered, roots)
//! - Topology construction from joint paths, including sparse joint sets
//! - Hierarchy composition driven by a topology

use glam::{DMat4, DVec3};

use myth_skel::errors::SkelError;
use myth_skel::scene::path::tokens;
use myth_skel::skel::{Topology, concat_joint_transforms_vec};

const EPSILON: f64 = 1e-9;

fn approx_vec(a: DVec3, b: DVec3) -> bool {
    (a - b).length() < EPSILON
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn valid_forest_is_accepted() {
    let topology = Topology::from_parent_indices(vec![-1, 0, 0, 1, -1, 4]).expect("valid");
    assert_eq!(topology.len(), 6);
    assert!(topology.is_root(0));
    assert!(topology.is_root(4));
    assert_eq!(topology.parent(3), 1);
    assert!(topology.validate().is_ok());
}

#[test]
fn empty_topology_is_valid() {
    let topology = Topology::from_parent_indices(Vec::new()).expect("valid");
    assert!(topology.is_empty());
}

#[test]
fn self_parented_joint_is_rejected() {
    let err = Topology::validate_parents(&[-1, 0, 2]).unwrap_err();
    assert_eq!(err, SkelError::SelfParented { joint: 2 });
    assert!(err.to_string().contains("itself as its parent"));
}

#[test]
fn misordered_parent_is_rejected() {
    let err = Topology::validate_parents(&[-1, 5, 0]).unwrap_err();
    assert_eq!(err, SkelError::MisorderedParent { joint: 1, parent: 5 });
    assert!(err.to_string().contains("mis-ordered parent 5"));
}

#[test]
fn first_violation_is_reported() {
    let err = Topology::from_parent_indices(vec![-1, 1, 7]).unwrap_err();
    assert_eq!(err, SkelError::SelfParented { joint: 1 });
}

// ============================================================================
// Joint paths
// ============================================================================

#[test]
fn parents_follow_joint_paths() {
    let joints = tokens(&["hips", "hips/spine", "hips/spine/head", "hips/leg"]);
    let topology = Topology::from_joint_tokens(&joints).expect("valid");
    assert_eq!(topology.parent_indices(), &[-1, 0, 1, 0]);
}

#[test]
fn sparse_joint_paths_skip_missing_ancestors() {
    let joints = tokens(&["root", "root/a/b", "other"]);
    let topology = Topology::from_joint_tokens(&joints).expect("valid");
    assert_eq!(topology.parent_indices(), &[-1, 0, -1]);
}

#[test]
fn child_before_parent_is_rejected() {
    let joints = tokens(&["root/child", "root"]);
    assert!(matches!(
        Topology::from_joint_tokens(&joints),
        Err(SkelError::MisorderedParent { joint: 0, parent: 1 })
    ));
}

// ============================================================================
// Composition over a topology
// ============================================================================

#[test]
fn grandchild_accumulates_translations() {
    let topology = Topology::from_parent_indices(vec![-1, 0, 0, 1]).expect("valid");
    let local = vec![
        DMat4::from_translation(DVec3::new(1.0, 0.0, 0.0)),
        DMat4::from_translation(DVec3::new(0.0, 2.0, 0.0)),
        DMat4::from_translation(DVec3::new(0.0, 0.0, 3.0)),
        DMat4::from_translation(DVec3::new(4.0, 0.0, 0.0)),
    ];
    let skel = concat_joint_transforms_vec(&topology, &local, None).expect("concat");
    assert!(approx_vec(skel[3].w_axis.truncate(), DVec3::new(5.0, 2.0, 0.0)));
    assert!(approx_vec(skel[2].w_axis.truncate(), DVec3::new(1.0, 0.0, 3.0)));
}

#[test]
fn root_transform_places_roots() {
    let topology = Topology::from_parent_indices(vec![-1, 0]).expect("valid");
    let local = vec![DMat4::IDENTITY, DMat4::from_translation(DVec3::X)];
    let root = DMat4::from_translation(DVec3::Z * 10.0);
    let skel = concat_joint_transforms_vec(&topology, &local, Some(&root)).expect("concat");
    assert!(approx_vec(skel[1].w_axis.truncate(), DVec3::new(1.0, 0.0, 10.0)));
}

#[test]
fn composition_rejects_wrong_local_count() {
    let topology = Topology::from_parent_indices(vec![-1, 0]).expect("valid");
    let err = concat_joint_transforms_vec(&topology, &[DMat4::IDENTITY], None).unwrap_err();
    assert!(matches!(err, SkelError::SizeMismatch { actual: 1, expected: 2, .. }));
}
