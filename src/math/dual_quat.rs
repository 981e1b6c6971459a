//! Dual quaternions for rigid blending.

use std::ops::{Add, AddAssign, Mul};

use glam::{DQuat, DVec3};

const NORMALIZE_EPSILON: f64 = 1e-10;

/// A dual quaternion `real + ε·dual` encoding a rotation followed by a
/// translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualQuat {
    pub real: DQuat,
    pub dual: DQuat,
}

impl DualQuat {
    pub const ZERO: Self = Self {
        real: DQuat::from_xyzw(0.0, 0.0, 0.0, 0.0),
        dual: DQuat::from_xyzw(0.0, 0.0, 0.0, 0.0),
    };

    /// Builds the dual quaternion of `rotation` followed by `translation`.
    #[must_use]
    pub fn from_rotation_translation(rotation: DQuat, translation: DVec3) -> Self {
        let t = DQuat::from_xyzw(translation.x, translation.y, translation.z, 0.0);
        Self {
            real: rotation,
            dual: (t * rotation) * 0.5,
        }
    }

    #[must_use]
    pub fn translation(&self) -> DVec3 {
        let t = (self.dual * self.real.conjugate()) * 2.0;
        DVec3::new(t.x, t.y, t.z)
    }

    /// Rescales to a unit real part and removes the component of the dual
    /// part parallel to it. A vanishing real part yields [`DualQuat::ZERO`].
    #[must_use]
    pub fn normalize(&self) -> Self {
        let length = self.real.length();
        if length < NORMALIZE_EPSILON {
            return Self::ZERO;
        }
        let inv = 1.0 / length;
        let real = self.real * inv;
        let dual = self.dual * inv;
        let dual = dual - real * real.dot(dual);
        Self { real, dual }
    }

    /// Applies the rotation then the translation to `p`.
    #[must_use]
    pub fn transform_point(&self, p: DVec3) -> DVec3 {
        self.real.mul_vec3(p) + self.translation()
    }
}

impl Add for DualQuat {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            real: self.real + rhs.real,
            dual: self.dual + rhs.dual,
        }
    }
}

impl AddAssign for DualQuat {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Mul<f64> for DualQuat {
    type Output = Self;

    fn mul(self, w: f64) -> Self {
        Self {
            real: self.real * w,
            dual: self.dual * w,
        }
    }
}
