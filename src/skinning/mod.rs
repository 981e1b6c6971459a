//! 蒙皮算法 (Skinning Algorithms)
//!
//! Stateless deformation kernels over caller-owned arrays:
//!
//! - [`points`]: linear blend and dual quaternion point skinning
//! - [`normals`]: normal skinning, including face-varying normals
//! - [`transform`]: rigid transform skinning through a 4-point frame
//! - [`blend_shape`]: weighted point offsets
//! - [`influences`]: influence accessors and maintenance (normalize, sort,
//!   resize, expand, interleave)
//!
//! Per-element kernels run in parallel above
//! [`PARALLEL_GRAIN_SIZE`](crate::utils::PARALLEL_GRAIN_SIZE) elements unless
//! the caller passes `in_serial = true`, which it must do when already
//! running inside a parallel loop.

pub mod blend_shape;
pub mod influences;
pub mod normals;
pub mod points;
pub mod transform;

use std::fmt;
use std::str::FromStr;

pub use blend_shape::{apply_blend_shape, validate_blend_shape};
pub use influences::{
    DEFAULT_NORMALIZE_EPSILON, Influences, InterleavedInfluences, SeparateInfluences,
    expand_constant_influences_to_varying, interleave_influences, normalize_weights,
    resize_joint_indices, resize_joint_weights, sort_influences,
};
pub use normals::{
    skin_face_varying_normals, skin_face_varying_normals_lbs, skin_normals,
    skin_normals_interleaved, skin_normals_lbs,
};
pub use points::{skin_points, skin_points_interleaved, skin_points_lbs};
pub use transform::{skin_transform, skin_transform_interleaved, skin_transform_lbs};

use crate::errors::SkelError;
use crate::scene::tokens;

/// How joint influences are blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SkinningMethod {
    /// Linear blend skinning.
    #[default]
    ClassicLinear,
    /// Dual quaternion skinning, with residual scale blended linearly.
    DualQuaternion,
}

impl SkinningMethod {
    /// Parses the authored token.
    pub fn from_token(token: &str) -> Result<Self, SkelError> {
        match token {
            tokens::CLASSIC_LINEAR => Ok(Self::ClassicLinear),
            tokens::DUAL_QUATERNION => Ok(Self::DualQuaternion),
            other => Err(SkelError::UnknownSkinningMethod(other.to_string()).warn()),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClassicLinear => tokens::CLASSIC_LINEAR,
            Self::DualQuaternion => tokens::DUAL_QUATERNION,
        }
    }
}

impl FromStr for SkinningMethod {
    type Err = SkelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s)
    }
}

impl fmt::Display for SkinningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_tokens() {
        assert_eq!(
            "dualQuaternion".parse::<SkinningMethod>(),
            Ok(SkinningMethod::DualQuaternion)
        );
        assert_eq!(SkinningMethod::default().to_string(), "classicLinear");
        assert_eq!(
            SkinningMethod::from_token("linear"),
            Err(SkelError::UnknownSkinningMethod("linear".into()))
        );
    }
}
