//! Attribute and relationship names consumed by the skeleton core.

// Binding properties (on skinnable prims and their ancestors)
pub const SKEL_SKELETON: &str = "skel:skeleton";
pub const SKEL_ANIMATION_SOURCE: &str = "skel:animationSource";
pub const SKEL_JOINTS: &str = "skel:joints";
pub const SKEL_SKINNING_METHOD: &str = "skel:skinningMethod";
pub const PRIMVARS_SKEL_JOINT_INDICES: &str = "primvars:skel:jointIndices";
pub const PRIMVARS_SKEL_JOINT_WEIGHTS: &str = "primvars:skel:jointWeights";
pub const PRIMVARS_SKEL_GEOM_BIND_TRANSFORM: &str = "primvars:skel:geomBindTransform";
pub const SKEL_BLEND_SHAPES: &str = "skel:blendShapes";
pub const SKEL_BLEND_SHAPE_TARGETS: &str = "skel:blendShapeTargets";

// Skeleton prims
pub const JOINTS: &str = "joints";
pub const JOINT_NAMES: &str = "jointNames";
pub const BIND_TRANSFORMS: &str = "bindTransforms";
pub const REST_TRANSFORMS: &str = "restTransforms";

// Animation prims
pub const TRANSLATIONS: &str = "translations";
pub const ROTATIONS: &str = "rotations";
pub const SCALES: &str = "scales";
pub const BLEND_SHAPES: &str = "blendShapes";
pub const BLEND_SHAPE_WEIGHTS: &str = "blendShapeWeights";

// Blend shape prims
pub const OFFSETS: &str = "offsets";
pub const NORMAL_OFFSETS: &str = "normalOffsets";
pub const POINT_INDICES: &str = "pointIndices";

// Skinning methods
pub const CLASSIC_LINEAR: &str = "classicLinear";
pub const DUAL_QUATERNION: &str = "dualQuaternion";

pub const ALL: [&str; 24] = [
    SKEL_SKELETON,
    SKEL_ANIMATION_SOURCE,
    SKEL_JOINTS,
    SKEL_SKINNING_METHOD,
    PRIMVARS_SKEL_JOINT_INDICES,
    PRIMVARS_SKEL_JOINT_WEIGHTS,
    PRIMVARS_SKEL_GEOM_BIND_TRANSFORM,
    SKEL_BLEND_SHAPES,
    SKEL_BLEND_SHAPE_TARGETS,
    JOINTS,
    JOINT_NAMES,
    BIND_TRANSFORMS,
    REST_TRANSFORMS,
    TRANSLATIONS,
    ROTATIONS,
    SCALES,
    BLEND_SHAPES,
    BLEND_SHAPE_WEIGHTS,
    OFFSETS,
    NORMAL_OFFSETS,
    POINT_INDICES,
    CLASSIC_LINEAR,
    DUAL_QUATERNION,
    "indices",
];
