//! Math helpers on top of `glam`.
//!
//! Joint and bind transforms are `DMat4` in glam's column-vector convention:
//! a child's skeleton-space transform is `parent * local`, and a point is
//! deformed by `skinning * p`.

pub mod bounds;
pub mod decompose;
pub mod dual_quat;

pub use bounds::BoundingBox;
pub use decompose::{FactoredTransform, factor_transform, orthonormalize};
pub use dual_quat::DualQuat;

use glam::{DMat3, DMat4};

/// Identity tolerance used when deciding whether a residual scale is present.
pub const IDENTITY_TOLERANCE: f64 = 1e-6;

/// Component-wise closeness of two 3x3 matrices.
#[inline]
#[must_use]
pub fn mat3_is_close(a: &DMat3, b: &DMat3, tolerance: f64) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .all(|(x, y)| (x - y).abs() <= tolerance)
}

/// Inverse transpose of the upper 3x3 block, used to transform normals.
#[inline]
#[must_use]
pub fn normal_matrix(m: &DMat4) -> DMat3 {
    DMat3::from_mat4(*m).inverse().transpose()
}
