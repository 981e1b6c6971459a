#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Skeleton evaluation and skinning core.
//!
//! - [`skel`]: joint topology, transform algorithms, skeleton and skinning
//!   queries
//! - [`skinning`]: linear blend and dual quaternion deformation kernels
//! - [`cache`]: thread-safe discovery and sharing of queries
//! - [`scene`]: the read-only scene graph the queries evaluate

pub mod cache;
pub mod errors;
pub mod math;
pub mod scene;
pub mod skel;
pub mod skinning;
pub mod utils;

pub use cache::{SkelBinding, SkelCache};
pub use errors::{Result, SkelError};
pub use math::{BoundingBox, DualQuat};
pub use scene::{Path, PrimKind, SceneGraph, SceneRef, Stage, TimeCode, Token};
pub use skel::{
    AnimMapper, AnimQuery, BlendShapeQuery, InfluenceBindings, SkelDefinition, SkeletonQuery,
    SkinningQuery, Topology,
};
pub use skinning::SkinningMethod;
