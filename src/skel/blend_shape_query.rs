//! Blend shape targets bound to a skinned prim.

use glam::Vec3;

use crate::errors::{Result, SkelError};
use crate::scene::{Path, PrimKind, SceneGraph, TimeCode, Token, Value, tokens};
use crate::skinning::{apply_blend_shape, validate_blend_shape};

/// Offsets authored on one `BlendShape` prim.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendShapeTarget {
    pub prim: Path,
    pub offsets: Vec<Vec3>,
    /// Empty when unauthored.
    pub normal_offsets: Vec<Vec3>,
    /// Points the offsets apply to. Empty means one offset per point.
    pub point_indices: Vec<i32>,
}

impl BlendShapeTarget {
    fn read(scene: &dyn SceneGraph, prim: Path) -> Option<Self> {
        if scene.prim_kind(prim) != Some(PrimKind::BlendShape) {
            log::warn!("<{prim}> is not a valid blend shape target.");
            return None;
        }
        let read = |name: &str| scene.attribute(prim, Token::new(name), TimeCode::Default);
        Some(Self {
            prim,
            offsets: read(tokens::OFFSETS)
                .and_then(Value::into_vec3_array)
                .unwrap_or_default(),
            normal_offsets: read(tokens::NORMAL_OFFSETS)
                .and_then(Value::into_vec3_array)
                .unwrap_or_default(),
            point_indices: read(tokens::POINT_INDICES)
                .and_then(Value::into_int_array)
                .unwrap_or_default(),
        })
    }
}

/// The resolved `skel:blendShapeTargets` of a prim, in `skel:blendShapes`
/// order.
#[derive(Debug, Clone, Default)]
pub struct BlendShapeQuery {
    targets: Vec<BlendShapeTarget>,
}

impl BlendShapeQuery {
    /// Reads every target. `None` if any target is not a blend shape prim.
    #[must_use]
    pub fn new(scene: &dyn SceneGraph, targets: &[Path]) -> Option<Self> {
        let targets = targets
            .iter()
            .map(|&prim| BlendShapeTarget::read(scene, prim))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { targets })
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn targets(&self) -> &[BlendShapeTarget] {
        &self.targets
    }

    /// Adds each target's offsets to `points`, scaled by the weight at the
    /// same position in `weights`.
    ///
    /// Every weighted target is checked against `points` before any point
    /// moves.
    pub fn compute_deformed_points(&self, weights: &[f32], points: &mut [Vec3]) -> Result<()> {
        SkelError::check_size("blend shape weights", weights.len(), "blend shape targets", self.len())?;
        let weighted = || self.targets.iter().zip(weights).filter(|(_, w)| **w != 0.0);

        for (target, _) in weighted() {
            validate_blend_shape(&target.offsets, &target.point_indices, points.len())?;
        }
        for (target, &weight) in weighted() {
            apply_blend_shape(weight, &target.offsets, &target.point_indices, points)?;
        }
        Ok(())
    }

    /// Like [`compute_deformed_points`](Self::compute_deformed_points) for
    /// per-point normals, using each target's normal offsets. Targets
    /// without normal offsets are skipped and moved normals are
    /// renormalized.
    pub fn compute_deformed_normals(&self, weights: &[f32], normals: &mut [Vec3]) -> Result<()> {
        SkelError::check_size("blend shape weights", weights.len(), "blend shape targets", self.len())?;
        let weighted = || {
            self.targets
                .iter()
                .zip(weights)
                .filter(|(t, w)| **w != 0.0 && !t.normal_offsets.is_empty())
        };

        let mut moved = false;
        for (target, _) in weighted() {
            validate_blend_shape(&target.normal_offsets, &target.point_indices, normals.len())?;
            moved = true;
        }
        for (target, &weight) in weighted() {
            apply_blend_shape(weight, &target.normal_offsets, &target.point_indices, normals)?;
        }
        if moved {
            for n in normals.iter_mut() {
                *n = n.normalize_or_zero();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Stage;

    fn stage_with_shapes() -> (Stage, Vec<Path>) {
        let mut stage = Stage::new();
        let smile = stage.define_blend_shape("/Mesh/Smile", vec![Vec3::Y, Vec3::Y], vec![]);
        let blink = stage.define_blend_shape("/Mesh/Blink", vec![Vec3::X], vec![1]);
        (stage, vec![smile, blink])
    }

    #[test]
    fn weighted_targets_accumulate() {
        let (stage, targets) = stage_with_shapes();
        let query = BlendShapeQuery::new(&stage, &targets).expect("targets");
        assert_eq!(query.len(), 2);

        let mut points = vec![Vec3::ZERO; 2];
        query
            .compute_deformed_points(&[0.5, 2.0], &mut points)
            .expect("deform");
        assert_eq!(points, vec![Vec3::new(0.0, 0.5, 0.0), Vec3::new(2.0, 0.5, 0.0)]);
    }

    #[test]
    fn out_of_range_target_leaves_points_untouched() {
        let (stage, targets) = stage_with_shapes();
        let query = BlendShapeQuery::new(&stage, &targets).expect("targets");

        // Three points: the dense target no longer fits.
        let mut points = vec![Vec3::ONE; 3];
        assert!(query.compute_deformed_points(&[1.0, 1.0], &mut points).is_err());
        assert_eq!(points, vec![Vec3::ONE; 3]);
    }

    #[test]
    fn non_blend_shape_target_is_rejected() {
        let mut stage = Stage::new();
        let mesh = stage.define_prim("/Mesh", PrimKind::Gprim);
        assert!(BlendShapeQuery::new(&stage, &[mesh]).is_none());
    }

    #[test]
    fn normals_without_offsets_are_unchanged() {
        let (stage, targets) = stage_with_shapes();
        let query = BlendShapeQuery::new(&stage, &targets).expect("targets");
        let mut normals = vec![Vec3::Z * 2.0; 2];
        query
            .compute_deformed_normals(&[1.0, 1.0], &mut normals)
            .expect("deform");
        assert_eq!(normals, vec![Vec3::Z * 2.0; 2]);
    }
}
