//! Shared, immutable description of a skeleton prim.

use std::fmt;
use std::sync::{Arc, OnceLock};

use glam::DMat4;

use super::topology::Topology;
use super::transforms::{compute_joint_local_transforms_with_inverses, concat_joint_transforms_vec, invert_transforms};
use crate::scene::{Path, PrimKind, SceneRef, TimeCode, Token, Value, tokens};

/// The joint order, topology and bind/rest poses of one skeleton.
///
/// Constructed once per skeleton prim and shared by every
/// [`SkeletonQuery`](super::SkeletonQuery) that uses it. Derived pose arrays
/// are computed on first use and kept for the lifetime of the definition.
pub struct SkelDefinition {
    scene: SceneRef,
    prim: Path,
    joint_order: Vec<Token>,
    joint_names: Vec<Token>,
    topology: Topology,
    world_bind_xforms: Vec<DMat4>,
    local_rest_xforms: Vec<DMat4>,

    skel_rest_xforms: OnceLock<Vec<DMat4>>,
    inverse_world_bind_xforms: OnceLock<Vec<DMat4>>,
    inverse_local_rest_xforms: OnceLock<Vec<DMat4>>,
    local_bind_xforms: OnceLock<Vec<DMat4>>,
}

impl SkelDefinition {
    /// Reads the skeleton at `prim`.
    ///
    /// Returns `None`, with a warning, if the prim is not a skeleton, its
    /// joint order does not form a valid topology, or its bind or rest
    /// transforms do not match the number of joints.
    #[must_use]
    pub fn new(scene: SceneRef, prim: Path) -> Option<Arc<Self>> {
        if scene.prim_kind(prim) != Some(PrimKind::Skeleton) {
            log::warn!("<{prim}> is not a valid Skeleton.");
            return None;
        }

        let read_default = |name: &str| scene.attribute(prim, Token::new(name), TimeCode::Default);

        let joint_order = read_default(tokens::JOINTS)
            .and_then(Value::into_token_array)
            .unwrap_or_default();
        let joint_names = read_default(tokens::JOINT_NAMES)
            .and_then(Value::into_token_array)
            .unwrap_or_default();

        let topology = match Topology::from_joint_tokens(&joint_order) {
            Ok(topology) => topology,
            Err(err) => {
                log::warn!("<{prim}> -- invalid topology: {err}");
                return None;
            }
        };

        let world_bind_xforms = read_default(tokens::BIND_TRANSFORMS)
            .and_then(Value::into_matrix_array)
            .unwrap_or_default();
        if world_bind_xforms.len() != joint_order.len() {
            log::warn!(
                "<{prim}> -- size of 'bindTransforms' attr [{}] does not match the number of \
                 joints in the 'joints' attr [{}].",
                world_bind_xforms.len(),
                joint_order.len()
            );
            return None;
        }

        let local_rest_xforms = read_default(tokens::REST_TRANSFORMS)
            .and_then(Value::into_matrix_array)
            .unwrap_or_default();
        if local_rest_xforms.len() != joint_order.len() {
            log::warn!(
                "<{prim}> -- size of 'restTransforms' attr [{}] does not match the number of \
                 joints in the 'joints' attr [{}].",
                local_rest_xforms.len(),
                joint_order.len()
            );
            return None;
        }

        log::debug!("Loaded skeleton <{prim}> with {} joints", joint_order.len());

        Some(Arc::new(Self {
            scene,
            prim,
            joint_order,
            joint_names,
            topology,
            world_bind_xforms,
            local_rest_xforms,
            skel_rest_xforms: OnceLock::new(),
            inverse_world_bind_xforms: OnceLock::new(),
            inverse_local_rest_xforms: OnceLock::new(),
            local_bind_xforms: OnceLock::new(),
        }))
    }

    #[inline]
    #[must_use]
    pub fn prim(&self) -> Path {
        self.prim
    }

    #[inline]
    #[must_use]
    pub fn scene(&self) -> &SceneRef {
        &self.scene
    }

    #[inline]
    #[must_use]
    pub fn joint_order(&self) -> &[Token] {
        &self.joint_order
    }

    /// Display names of the joints. Empty when unauthored.
    #[inline]
    #[must_use]
    pub fn joint_names(&self) -> &[Token] {
        &self.joint_names
    }

    #[inline]
    #[must_use]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    #[inline]
    #[must_use]
    pub fn num_joints(&self) -> usize {
        self.joint_order.len()
    }

    /// Rest pose in joint-local space.
    #[inline]
    #[must_use]
    pub fn joint_local_rest_transforms(&self) -> &[DMat4] {
        &self.local_rest_xforms
    }

    /// Bind pose in world space.
    #[inline]
    #[must_use]
    pub fn joint_world_bind_transforms(&self) -> &[DMat4] {
        &self.world_bind_xforms
    }

    /// Rest pose composed into skeleton space.
    pub fn joint_skel_rest_transforms(&self) -> &[DMat4] {
        self.skel_rest_xforms.get_or_init(|| {
            // Sizes and ordering were checked on construction.
            concat_joint_transforms_vec(&self.topology, &self.local_rest_xforms, None)
                .unwrap_or_else(|_| vec![DMat4::IDENTITY; self.num_joints()])
        })
    }

    pub fn joint_world_inverse_bind_transforms(&self) -> &[DMat4] {
        self.inverse_world_bind_xforms
            .get_or_init(|| invert_transforms(&self.world_bind_xforms, false))
    }

    pub fn joint_local_inverse_rest_transforms(&self) -> &[DMat4] {
        self.inverse_local_rest_xforms
            .get_or_init(|| invert_transforms(&self.local_rest_xforms, false))
    }

    /// Bind pose expressed relative to each joint's parent.
    pub fn joint_local_bind_transforms(&self) -> &[DMat4] {
        self.local_bind_xforms.get_or_init(|| {
            let mut local = vec![DMat4::IDENTITY; self.num_joints()];
            if compute_joint_local_transforms_with_inverses(
                &self.topology,
                &self.world_bind_xforms,
                self.joint_world_inverse_bind_transforms(),
                &mut local,
                None,
            )
            .is_err()
            {
                local.fill(DMat4::IDENTITY);
            }
            local
        })
    }
}

impl fmt::Debug for SkelDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkelDefinition")
            .field("prim", &self.prim)
            .field("num_joints", &self.num_joints())
            .finish_non_exhaustive()
    }
}
