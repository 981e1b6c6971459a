//! Matrix factorization into rotation, scale and translation.

use glam::{DMat3, DMat4, DVec3};

/// Determinants below this magnitude are treated as singular.
pub const SINGULAR_EPSILON: f64 = 1e-10;

const ORTHONORMALIZE_MAX_ITERATIONS: usize = 32;
const ORTHONORMALIZE_TOLERANCE: f64 = 1e-12;

/// A transform factored into its components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactoredTransform {
    pub translation: DVec3,
    /// Proper rotation (determinant +1).
    pub rotation: DMat3,
    /// Per-axis scale. Negative when the source flips handedness.
    pub scale: DVec3,
}

/// Returns the orthogonal factor of the polar decomposition of `m`, the
/// closest orthonormal matrix to `m`. `None` if `m` is singular.
///
/// Uses the Newton iteration `R = (R + R^-T) / 2`, which preserves the sign
/// of the determinant.
#[must_use]
pub fn orthonormalize(m: &DMat3) -> Option<DMat3> {
    if m.determinant().abs() < SINGULAR_EPSILON {
        return None;
    }
    let mut r = *m;
    for _ in 0..ORTHONORMALIZE_MAX_ITERATIONS {
        let det = r.determinant();
        if det.abs() < SINGULAR_EPSILON {
            return None;
        }
        let next = (r + r.inverse().transpose()) * 0.5;
        let delta = (next - r).to_cols_array().iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        r = next;
        if delta < ORTHONORMALIZE_TOLERANCE {
            break;
        }
    }
    Some(r)
}

/// Factors `m` into translation, proper rotation and scale.
///
/// Handedness flips are folded into the scale so that the rotation stays
/// proper. Shear, if any, is discarded. Returns `None` for singular input.
#[must_use]
pub fn factor_transform(m: &DMat4) -> Option<FactoredTransform> {
    let m3 = DMat3::from_mat4(*m);
    let det = m3.determinant();
    if det.abs() < SINGULAR_EPSILON || !det.is_finite() {
        return None;
    }
    let sign = det.signum();
    let a = m3 * sign;
    let rotation = orthonormalize(&a)?;
    let s = rotation.transpose() * a;
    Some(FactoredTransform {
        translation: m.w_axis.truncate(),
        rotation,
        scale: DVec3::new(s.x_axis.x, s.y_axis.y, s.z_axis.z) * sign,
    })
}

#[cfg(test)]
mod tests {
    use glam::DQuat;

    use super::*;

    fn max_diff(a: &DMat4, b: &DMat4) -> f64 {
        (*a - *b)
            .to_cols_array()
            .iter()
            .fold(0.0, |acc, v| acc.max(v.abs()))
    }

    #[test]
    fn factors_scale_rotate_translate() {
        let rot = DQuat::from_rotation_y(0.7) * DQuat::from_rotation_x(-0.3);
        let m = DMat4::from_scale_rotation_translation(
            DVec3::new(2.0, 0.5, 3.0),
            rot,
            DVec3::new(1.0, -2.0, 4.0),
        );
        let f = factor_transform(&m).expect("non-singular");
        assert!((f.scale - DVec3::new(2.0, 0.5, 3.0)).abs().max_element() < 1e-9);
        assert!((f.translation - DVec3::new(1.0, -2.0, 4.0)).abs().max_element() < 1e-12);
        let rebuilt = DMat4::from_scale_rotation_translation(
            f.scale,
            DQuat::from_mat3(&f.rotation),
            f.translation,
        );
        assert!(max_diff(&rebuilt, &m) < 1e-9);
    }

    #[test]
    fn negative_scale_keeps_rotation_proper() {
        let m = DMat4::from_scale(DVec3::new(-1.0, 1.0, 1.0));
        let f = factor_transform(&m).expect("non-singular");
        assert!((f.rotation.determinant() - 1.0).abs() < 1e-9);
        let rebuilt = DMat4::from_mat3(f.rotation * DMat3::from_diagonal(f.scale));
        assert!(max_diff(&rebuilt, &m) < 1e-9);
    }

    #[test]
    fn singular_fails() {
        let m = DMat4::from_scale(DVec3::new(1.0, 0.0, 1.0));
        assert!(factor_transform(&m).is_none());
    }

    #[test]
    fn orthonormalize_removes_skew() {
        let m = DMat3::from_cols(
            DVec3::new(1.0, 0.1, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
        );
        let r = orthonormalize(&m).expect("non-singular");
        let rtr = r.transpose() * r;
        assert!((rtr - DMat3::IDENTITY).to_cols_array().iter().all(|v| v.abs() < 1e-9));
    }
}
