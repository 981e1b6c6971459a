//! 骨骼缓存 (Skel Cache)
//!
//! [`SkelCache`] discovers skeleton bindings beneath a root prim and hands
//! out shared [`SkeletonQuery`]s and [`SkinningQuery`]s.
//!
//! ```text
//! SkelCache
//!   └── CacheImpl
//!         ├── definitions       Path -> Arc<SkelDefinition>
//!         ├── anim_queries      Path -> Arc<AnimQuery>
//!         ├── skel_queries      binding prim -> Arc<SkeletonQuery>
//!         └── skinning_queries  skinned prim -> Arc<SkinningQuery>
//! ```
//!
//! Lookups may run from any number of threads. [`SkelCache::populate`] and
//! [`SkelCache::clear`] take the cache exclusively.

pub mod cache_impl;

use std::sync::Arc;

pub use cache_impl::{CacheImpl, ReadScope, SkelBinding, WriteScope};

use crate::errors::Result;
use crate::scene::{Path, PrimKind, SceneRef, Token, tokens};
use crate::skel::{AnimQuery, SkeletonQuery, SkinningQuery};

/// Thread-safe cache of skeleton and skinning queries for one scene.
pub struct SkelCache {
    inner: CacheImpl,
}

impl SkelCache {
    #[must_use]
    pub fn new(scene: SceneRef) -> Self {
        Self {
            inner: CacheImpl::new(scene),
        }
    }

    #[inline]
    #[must_use]
    pub fn scene(&self) -> &SceneRef {
        self.inner.scene()
    }

    /// [Read] Shared scope for batched lookups.
    pub fn read_scope(&self) -> ReadScope<'_> {
        self.inner.read_scope()
    }

    /// [Write] Resolves every binding beneath `root`.
    pub fn populate(&self, root: Path) -> Result<()> {
        self.inner.write_scope().populate(root)
    }

    /// [Write] Drops all cached definitions and queries.
    pub fn clear(&self) {
        self.inner.write_scope().clear();
    }

    /// [Read] Skeleton query for `prim`.
    ///
    /// Returns the query cached at `prim` by [`populate`](Self::populate). A
    /// skeleton prim that was not populated gets a query driven by its own
    /// `skel:animationSource`.
    #[must_use]
    pub fn get_skel_query(&self, prim: Path) -> Option<Arc<SkeletonQuery>> {
        let scope = self.read_scope();
        if let Some(query) = scope.find_skel_query(prim) {
            return Some(query);
        }
        if self.scene().prim_kind(prim) != Some(PrimKind::Skeleton) {
            return None;
        }
        let anim = self
            .scene()
            .first_target(prim, Token::new(tokens::SKEL_ANIMATION_SOURCE));
        scope.find_or_create_skel_query(prim, prim, anim)
    }

    /// [Read] Skeleton query bound at `prim` or its nearest ancestor with an
    /// authored `skel:skeleton` binding. An empty binding yields `None`.
    ///
    /// The animation is the nearest `skel:animationSource` at or above the
    /// binding prim.
    #[must_use]
    pub fn get_inherited_skel_query(&self, prim: Path) -> Option<Arc<SkeletonQuery>> {
        let scene = self.scene();
        let skeleton = Token::new(tokens::SKEL_SKELETON);
        let animation_source = Token::new(tokens::SKEL_ANIMATION_SOURCE);
        let scope = self.read_scope();

        for binding_prim in std::iter::once(prim).chain(prim.ancestors()) {
            let Some(targets) = scene.relationship_targets(binding_prim, skeleton) else {
                continue;
            };
            if let Some(query) = scope.find_skel_query(binding_prim) {
                return Some(query);
            }
            // An authored but empty binding hides every ancestor's.
            let skel = *targets.first()?;
            let anim = std::iter::once(binding_prim)
                .chain(binding_prim.ancestors())
                .find_map(|p| scene.relationship_targets(p, animation_source))
                .and_then(|targets| targets.first().copied());
            return scope.find_or_create_skel_query(binding_prim, skel, anim);
        }
        None
    }

    /// [Read] Skinning query cached for `prim` by [`populate`](Self::populate).
    #[must_use]
    pub fn get_skinning_query(&self, prim: Path) -> Option<Arc<SkinningQuery>> {
        self.read_scope().find_skinning_query(prim)
    }

    /// [Read] Animation query for an animation prim.
    #[must_use]
    pub fn get_anim_query(&self, prim: Path) -> Option<Arc<AnimQuery>> {
        self.read_scope().find_or_create_anim_query(prim)
    }

    /// [Read] Groups the populated skinning queries beneath `root` by bound
    /// skeleton, in traversal order.
    #[must_use]
    pub fn compute_skel_bindings(&self, root: Path) -> Vec<SkelBinding> {
        self.read_scope().compute_skel_bindings(root)
    }

    /// [Read] The binding of `skeleton` beneath `root`, if any prim there is
    /// skinned by it.
    #[must_use]
    pub fn compute_skel_binding(&self, root: Path, skeleton: Path) -> Option<SkelBinding> {
        self.compute_skel_bindings(root)
            .into_iter()
            .find(|binding| binding.skeleton == skeleton)
    }
}

impl std::fmt::Debug for SkelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkelCache").finish_non_exhaustive()
    }
}
