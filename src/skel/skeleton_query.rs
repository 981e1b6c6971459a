//! Pose evaluation for a skeleton and its (optional) animation.

use std::fmt;
use std::sync::Arc;

use glam::DMat4;

use super::anim_mapper::AnimMapper;
use super::anim_query::AnimQuery;
use super::definition::SkelDefinition;
use super::topology::Topology;
use super::transforms::{compute_joints_extent, concat_joint_transforms_vec};
use crate::errors::{Result, SkelError};
use crate::math::BoundingBox;
use crate::scene::{Path, TimeCode, Token};

/// Evaluates joint transforms of one skeleton, driven by an optional
/// animation.
///
/// Joints the animation does not drive keep their rest transforms, as do
/// all joints when there is no animation, when the animation's joints do not
/// overlap the skeleton's, or when a pose is requested `at_rest`.
#[derive(Clone)]
pub struct SkeletonQuery {
    definition: Arc<SkelDefinition>,
    anim: Option<Arc<AnimQuery>>,
    anim_to_skel_mapper: AnimMapper,
}

impl SkeletonQuery {
    #[must_use]
    pub fn new(definition: Arc<SkelDefinition>, anim: Option<Arc<AnimQuery>>) -> Self {
        let anim_to_skel_mapper = anim
            .as_ref()
            .map(|a| AnimMapper::new(a.joint_order(), definition.joint_order()))
            .unwrap_or_default();
        if anim.is_some() && anim_to_skel_mapper.is_null() {
            log::debug!(
                "Animation does not drive any joint of <{}>; using rest pose.",
                definition.prim()
            );
        }
        Self {
            definition,
            anim,
            anim_to_skel_mapper,
        }
    }

    #[inline]
    #[must_use]
    pub fn prim(&self) -> Path {
        self.definition.prim()
    }

    #[inline]
    #[must_use]
    pub fn definition(&self) -> &Arc<SkelDefinition> {
        &self.definition
    }

    #[inline]
    #[must_use]
    pub fn anim_query(&self) -> Option<&Arc<AnimQuery>> {
        self.anim.as_ref()
    }

    /// Mapping from the animation's joint order to the skeleton's.
    #[inline]
    #[must_use]
    pub fn mapper(&self) -> &AnimMapper {
        &self.anim_to_skel_mapper
    }

    #[inline]
    #[must_use]
    pub fn topology(&self) -> &Topology {
        self.definition.topology()
    }

    #[inline]
    #[must_use]
    pub fn joint_order(&self) -> &[Token] {
        self.definition.joint_order()
    }

    #[inline]
    #[must_use]
    pub fn joint_world_bind_transforms(&self) -> &[DMat4] {
        self.definition.joint_world_bind_transforms()
    }

    /// Whether the pose may change over time.
    #[must_use]
    pub fn has_time_varying_pose(&self) -> bool {
        self.usable_anim()
            .is_some_and(|a| a.joint_transforms_might_be_time_varying())
    }

    fn usable_anim(&self) -> Option<&Arc<AnimQuery>> {
        self.anim
            .as_ref()
            .filter(|_| !self.anim_to_skel_mapper.is_null())
    }

    // ========================================================================
    // Pose evaluation
    // ========================================================================

    /// Joint-local transforms in skeleton joint order.
    pub fn compute_joint_local_transforms(&self, time: TimeCode, at_rest: bool) -> Result<Vec<DMat4>> {
        let rest = self.definition.joint_local_rest_transforms();

        if !at_rest && let Some(anim) = self.usable_anim() {
            let mut xforms = if self.anim_to_skel_mapper.is_sparse() {
                rest.to_vec()
            } else {
                Vec::with_capacity(rest.len())
            };
            match anim.compute_joint_local_transforms(time) {
                Ok(anim_xforms) => {
                    self.anim_to_skel_mapper
                        .remap_transforms(&anim_xforms, &mut xforms, 1)?;
                    return Ok(xforms);
                }
                Err(err) => {
                    log::debug!("<{}>: falling back to rest pose ({err})", self.prim());
                }
            }
        }
        Ok(rest.to_vec())
    }

    /// Joint transforms in skeleton space.
    pub fn compute_joint_skel_transforms(&self, time: TimeCode, at_rest: bool) -> Result<Vec<DMat4>> {
        if at_rest {
            return Ok(self.definition.joint_skel_rest_transforms().to_vec());
        }
        let local = self.compute_joint_local_transforms(time, false)?;
        concat_joint_transforms_vec(self.topology(), &local, None)
    }

    /// Joint transforms in world space, given the skeleton prim's own
    /// local-to-world transform.
    pub fn compute_joint_world_transforms(
        &self,
        time: TimeCode,
        skel_local_to_world: &DMat4,
        at_rest: bool,
    ) -> Result<Vec<DMat4>> {
        let local = self.compute_joint_local_transforms(time, at_rest)?;
        concat_joint_transforms_vec(self.topology(), &local, Some(skel_local_to_world))
    }

    /// Skinning transforms: each skeleton-space joint transform composed
    /// with its inverse world bind transform.
    pub fn compute_skinning_transforms(&self, time: TimeCode) -> Result<Vec<DMat4>> {
        let mut xforms = self.compute_joint_skel_transforms(time, false)?;
        let inverse_bind = self.definition.joint_world_inverse_bind_transforms();
        SkelError::check_size(
            "skel transforms",
            xforms.len(),
            "inverse bind transforms",
            inverse_bind.len(),
        )?;
        for (xf, inv) in xforms.iter_mut().zip(inverse_bind) {
            *xf *= *inv;
        }
        Ok(xforms)
    }

    /// Local transforms relative to the rest pose: `inverse(rest) * local`.
    pub fn compute_joint_rest_relative_transforms(&self, time: TimeCode) -> Result<Vec<DMat4>> {
        let mut xforms = self.compute_joint_local_transforms(time, false)?;
        let inverse_rest = self.definition.joint_local_inverse_rest_transforms();
        SkelError::check_size(
            "local transforms",
            xforms.len(),
            "inverse rest transforms",
            inverse_rest.len(),
        )?;
        for (xf, inv) in xforms.iter_mut().zip(inverse_rest) {
            *xf = *inv * *xf;
        }
        Ok(xforms)
    }

    /// Bounds of the posed joint pivots in skeleton space, padded by `pad`
    /// and optionally moved by `root_xform`.
    pub fn compute_joints_extent(
        &self,
        time: TimeCode,
        pad: f32,
        root_xform: Option<&DMat4>,
    ) -> Result<BoundingBox> {
        let xforms = self.compute_joint_skel_transforms(time, false)?;
        Ok(compute_joints_extent(&xforms, pad, root_xform))
    }
}

impl fmt::Display for SkeletonQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SkeletonQuery <{}>", self.prim())?;
        if let Some(anim) = &self.anim {
            write!(f, " anim <{}>", anim.prim())?;
        }
        Ok(())
    }
}

impl fmt::Debug for SkeletonQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkeletonQuery")
            .field("definition", &self.definition)
            .field("anim", &self.anim)
            .field("mapper", &self.anim_to_skel_mapper)
            .finish()
    }
}
