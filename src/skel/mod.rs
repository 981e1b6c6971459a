//! 骨骼系统 (Skeleton)
//!
//! Joint hierarchies and the queries that evaluate them:
//!
//! - [`Topology`]: the parent-index forest and its ordering invariant
//! - [`transforms`]: stateless composition, decomposition and extent of
//!   flat joint transform arrays
//! - [`SkelDefinition`]: joint order and bind/rest poses of a skeleton prim
//! - [`AnimQuery`]: time-sampled joint transforms of an animation prim
//! - [`AnimMapper`]: animation order to skeleton order remapping
//! - [`SkeletonQuery`]: posed local/skel/world/skinning transforms
//! - [`SkinningQuery`]: influences of a skinned prim and its deformation
//! - [`BlendShapeQuery`]: blend shape targets applied ahead of skinning
//!
//! Definitions and animation queries are shared through `Arc`, so any number
//! of skeleton queries may reference them.

pub mod anim_mapper;
pub mod anim_query;
pub mod blend_shape_query;
pub mod definition;
pub mod skeleton_query;
pub mod skinning_query;
pub mod topology;
pub mod transforms;

pub use anim_mapper::AnimMapper;
pub use anim_query::AnimQuery;
pub use blend_shape_query::{BlendShapeQuery, BlendShapeTarget};
pub use definition::SkelDefinition;
pub use skeleton_query::SkeletonQuery;
pub use skinning_query::{InfluenceBindings, SkinningQuery};
pub use topology::Topology;
pub use transforms::{
    compute_joint_local_transforms, compute_joint_local_transforms_with_inverses,
    compute_joints_extent, concat_joint_transforms, concat_joint_transforms_vec,
    decompose_transform, decompose_transforms, make_transform, make_transform_from_matrix,
    make_transforms,
};
