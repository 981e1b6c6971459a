//! Read access to a skeletal animation prim.

use std::fmt;
use std::sync::Arc;

use glam::{DMat4, Quat, Vec3};

use super::transforms::make_transforms;
use crate::errors::{Result, SkelError};
use crate::scene::{Path, PrimKind, SceneRef, TimeCode, Token, Value, tokens};

/// Joint-ordered, time-sampled local joint transforms and blend shape
/// weights authored on a `SkelAnimation` prim.
pub struct AnimQuery {
    scene: SceneRef,
    prim: Path,
    joint_order: Vec<Token>,
    blend_shape_order: Vec<Token>,
}

impl AnimQuery {
    /// Wraps the animation at `prim`. `None` if the prim is not an
    /// animation.
    #[must_use]
    pub fn new(scene: SceneRef, prim: Path) -> Option<Arc<Self>> {
        if scene.prim_kind(prim) != Some(PrimKind::SkelAnimation) {
            log::warn!("<{prim}> is not a valid skel animation source.");
            return None;
        }
        let read_tokens = |name: &str| {
            scene
                .attribute(prim, Token::new(name), TimeCode::Default)
                .and_then(Value::into_token_array)
                .unwrap_or_default()
        };
        let joint_order = read_tokens(tokens::JOINTS);
        let blend_shape_order = read_tokens(tokens::BLEND_SHAPES);
        Some(Arc::new(Self {
            scene,
            prim,
            joint_order,
            blend_shape_order,
        }))
    }

    #[inline]
    #[must_use]
    pub fn prim(&self) -> Path {
        self.prim
    }

    /// Order of the joints the animation drives.
    #[inline]
    #[must_use]
    pub fn joint_order(&self) -> &[Token] {
        &self.joint_order
    }

    #[inline]
    #[must_use]
    pub fn blend_shape_order(&self) -> &[Token] {
        &self.blend_shape_order
    }

    fn read<T>(&self, name: &'static str, time: TimeCode, extract: fn(Value) -> Option<T>) -> Result<T> {
        self.scene
            .attribute(self.prim, Token::new(name), time)
            .and_then(extract)
            .ok_or_else(|| {
                SkelError::MissingValue {
                    prim: self.prim.to_string(),
                    attribute: name.to_string(),
                }
                .warn()
            })
    }

    /// Translations, rotations and scales of the animated joints at `time`.
    pub fn compute_joint_local_transform_components(
        &self,
        time: TimeCode,
    ) -> Result<(Vec<Vec3>, Vec<Quat>, Vec<Vec3>)> {
        let translations = self.read(tokens::TRANSLATIONS, time, Value::into_vec3_array)?;
        let rotations = self.read(tokens::ROTATIONS, time, Value::into_quat_array)?;
        let scales = self.read(tokens::SCALES, time, Value::into_vec3_array)?;
        Ok((translations, rotations, scales))
    }

    /// Local joint transforms at `time`, in [`joint_order`](Self::joint_order).
    pub fn compute_joint_local_transforms(&self, time: TimeCode) -> Result<Vec<DMat4>> {
        let (translations, rotations, scales) = self.compute_joint_local_transform_components(time)?;
        let mut xforms = vec![DMat4::IDENTITY; translations.len()];
        make_transforms(&translations, &rotations, &scales, &mut xforms)?;
        Ok(xforms)
    }

    /// Blend shape weights at `time`, in
    /// [`blend_shape_order`](Self::blend_shape_order).
    pub fn compute_blend_shape_weights(&self, time: TimeCode) -> Result<Vec<f32>> {
        self.read(tokens::BLEND_SHAPE_WEIGHTS, time, Value::into_float_array)
    }

    /// Union of the sample times of the translation, rotation and scale
    /// attributes, sorted and deduplicated.
    #[must_use]
    pub fn joint_transform_time_samples(&self) -> Vec<f64> {
        let mut times: Vec<f64> = [tokens::TRANSLATIONS, tokens::ROTATIONS, tokens::SCALES]
            .iter()
            .flat_map(|name| self.scene.time_samples(self.prim, Token::new(name)))
            .collect();
        times.sort_by(f64::total_cmp);
        times.dedup();
        times
    }

    /// Whether any joint transform component has more than one sample.
    #[must_use]
    pub fn joint_transforms_might_be_time_varying(&self) -> bool {
        [tokens::TRANSLATIONS, tokens::ROTATIONS, tokens::SCALES]
            .iter()
            .any(|name| self.scene.time_samples(self.prim, Token::new(name)).len() > 1)
    }
}

impl fmt::Debug for AnimQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimQuery")
            .field("prim", &self.prim)
            .field("joint_order", &self.joint_order)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use super::*;
    use crate::scene::Stage;

    #[test]
    fn samples_are_merged() {
        let mut stage = Stage::new();
        let anim = stage.define_prim("/Anim", PrimKind::SkelAnimation);
        stage.set_time_sample(anim, tokens::TRANSLATIONS, 2.0, vec![Vec3::ZERO]);
        stage.set_time_sample(anim, tokens::ROTATIONS, 1.0, vec![Quat::IDENTITY]);
        stage.set_time_sample(anim, tokens::ROTATIONS, 2.0, vec![Quat::IDENTITY]);
        let query = AnimQuery::new(Arc::new(stage), anim).expect("animation prim");
        assert_eq!(query.joint_transform_time_samples(), vec![1.0, 2.0]);
        assert!(query.joint_transforms_might_be_time_varying());
    }

    #[test]
    fn transforms_from_components() {
        let mut stage = Stage::new();
        let anim = stage.define_animation(
            "/Anim",
            &["a"],
            vec![Vec3::new(1.0, 2.0, 3.0)],
            vec![Quat::IDENTITY],
            vec![Vec3::ONE],
        );
        let query = AnimQuery::new(Arc::new(stage), anim).expect("animation prim");
        let xforms = query
            .compute_joint_local_transforms(TimeCode::Default)
            .expect("authored components");
        assert_eq!(xforms[0].w_axis.truncate(), DVec3::new(1.0, 2.0, 3.0));
        assert!(query.compute_blend_shape_weights(TimeCode::Default).is_err());
    }
}
