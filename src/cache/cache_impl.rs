//! Concurrent store of skeleton definitions and queries.
//!
//! # Locking
//!
//! A single scope lock separates the two modes of use:
//!
//! - [`ReadScope`] (shared): lookups and per-key insert-if-absent. Any
//!   number of threads may race on the same key; the value is constructed
//!   once and every thread observes the same `Arc`.
//! - [`WriteScope`] (exclusive): [`populate`](WriteScope::populate) and
//!   [`clear`](WriteScope::clear).
//!
//! Each map additionally guards its own structure with a short-lived
//! `RwLock`; value construction runs outside of it, inside a per-key
//! `OnceLock`.

use std::hash::Hash;
use std::sync::{Arc, OnceLock};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::{Result, SkelError};
use crate::scene::{AttributePath, Path, PrimKind, SceneRef, TimeCode, Token, Value, tokens};
use crate::skel::{AnimQuery, InfluenceBindings, SkelDefinition, SkeletonQuery, SkinningQuery};

// ============================================================================
// Keyed insert-if-absent map
// ============================================================================

type Slot<V> = Arc<OnceLock<Option<V>>>;

/// Map whose values are built at most once per key, even under contention.
/// Failed constructions are remembered as `None`.
struct OnceMap<K, V> {
    slots: RwLock<FxHashMap<K, Slot<V>>>,
}

impl<K: Eq + Hash, V: Clone> OnceMap<K, V> {
    fn new() -> Self {
        Self {
            slots: RwLock::new(FxHashMap::default()),
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        self.slots.read().get(key).and_then(|slot| slot.get().cloned().flatten())
    }

    fn get_or_create(&self, key: K, create: impl FnOnce() -> Option<V>) -> Option<V> {
        let existing = self.slots.read().get(&key).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => self.slots.write().entry(key).or_default().clone(),
        };
        slot.get_or_init(create).clone()
    }

    fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| matches!(slot.get(), Some(Some(_))))
            .count()
    }

    fn clear(&self) {
        self.slots.write().clear();
    }
}

/// Skinning queries are shared by prims whose bindings resolve to the same
/// properties under the same skeleton and animation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SkinningQueryKey {
    bindings: InfluenceBindings,
    skel: Option<Path>,
    anim: Option<Path>,
}

// ============================================================================
// CacheImpl
// ============================================================================

/// Storage behind [`SkelCache`](super::SkelCache). All access goes through a
/// [`ReadScope`] or [`WriteScope`].
pub struct CacheImpl {
    scene: SceneRef,
    scope: RwLock<()>,
    definitions: OnceMap<Path, Arc<SkelDefinition>>,
    anim_queries: OnceMap<Path, Arc<AnimQuery>>,
    /// Keyed by the prim that binds the skeleton (or the skeleton itself).
    skel_queries: OnceMap<Path, Arc<SkeletonQuery>>,
    /// Keyed by the skinned prim.
    prim_skinning_queries: OnceMap<Path, Arc<SkinningQuery>>,
    skinning_queries: OnceMap<SkinningQueryKey, Arc<SkinningQuery>>,
}

impl CacheImpl {
    #[must_use]
    pub fn new(scene: SceneRef) -> Self {
        crate::utils::interner::preload_binding_names();
        Self {
            scene,
            scope: RwLock::new(()),
            definitions: OnceMap::new(),
            anim_queries: OnceMap::new(),
            skel_queries: OnceMap::new(),
            prim_skinning_queries: OnceMap::new(),
            skinning_queries: OnceMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn scene(&self) -> &SceneRef {
        &self.scene
    }

    /// [Read] Acquires a shared scope. Blocks while a writer is active.
    pub fn read_scope(&self) -> ReadScope<'_> {
        ReadScope {
            cache: self,
            _guard: self.scope.read(),
        }
    }

    /// [Write] Acquires an exclusive scope. Blocks until all readers leave.
    pub fn write_scope(&self) -> WriteScope<'_> {
        WriteScope {
            cache: self,
            _guard: self.scope.write(),
        }
    }

    // ========================================================================
    // Construction (callers hold a scope)
    // ========================================================================

    fn find_or_create_skel_definition(&self, prim: Path) -> Option<Arc<SkelDefinition>> {
        self.definitions
            .get_or_create(prim, || SkelDefinition::new(self.scene.clone(), prim))
    }

    fn find_or_create_anim_query(&self, prim: Path) -> Option<Arc<AnimQuery>> {
        self.anim_queries
            .get_or_create(prim, || AnimQuery::new(self.scene.clone(), prim))
    }

    fn find_or_create_skel_query(&self, key: Path, skel: Path, anim: Option<Path>) -> Option<Arc<SkeletonQuery>> {
        self.skel_queries.get_or_create(key, || {
            let definition = self.find_or_create_skel_definition(skel)?;
            let anim = anim.and_then(|a| self.find_or_create_anim_query(a));
            Some(Arc::new(SkeletonQuery::new(definition, anim)))
        })
    }

    fn find_or_create_skinning_query(
        &self,
        prim: Path,
        bindings: &InfluenceBindings,
        skel_query: Option<&Arc<SkeletonQuery>>,
    ) -> Option<Arc<SkinningQuery>> {
        self.prim_skinning_queries.get_or_create(prim, || {
            let anim = skel_query.and_then(|q| q.anim_query());
            let key = SkinningQueryKey {
                bindings: bindings.clone(),
                skel: skel_query.map(|q| q.prim()),
                anim: anim.map(|a| a.prim()),
            };
            self.skinning_queries.get_or_create(key, || {
                let joint_order = skel_query.map_or(&[][..], |q| q.joint_order());
                let blend_shape_order = anim.map_or(&[][..], |a| a.blend_shape_order());
                Some(Arc::new(SkinningQuery::new(
                    self.scene.clone(),
                    prim,
                    skel_query.map(|q| q.prim()),
                    joint_order,
                    blend_shape_order,
                    bindings.clone(),
                )))
            })
        })
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Depth-first walk below (and including) `root`.
    ///
    /// Inactive and non-imageable prims are pruned with their subtrees.
    /// Instances descend into their prototype's children, each prototype at
    /// most once per walk. `visit` returns whether to descend; the state it
    /// leaves behind is handed to every child.
    fn walk<S: Clone>(&self, root: Path, initial: S, mut visit: impl FnMut(Path, PrimKind, &mut S) -> bool) {
        let mut visited_prototypes = FxHashSet::default();
        let mut stack = vec![(root, initial)];

        while let Some((prim, mut state)) = stack.pop() {
            let Some(kind) = self.scene.prim_kind(prim) else {
                continue;
            };
            if !self.scene.is_active(prim) || !kind.is_imageable() {
                log::trace!("Pruning <{prim}>");
                continue;
            }
            if !visit(prim, kind, &mut state) {
                continue;
            }

            let children = match self.scene.instance_prototype(prim) {
                Some(prototype) => {
                    if !visited_prototypes.insert(prototype) {
                        log::trace!("Prototype <{prototype}> of <{prim}> already visited");
                        continue;
                    }
                    self.scene.children(prototype)
                }
                None => self.scene.children(prim),
            };
            stack.extend(children.into_iter().rev().map(|child| (child, state.clone())));
        }
    }

    fn populate(&self, root: Path) -> Result<()> {
        if !self.scene.is_valid(root) {
            return Err(SkelError::InvalidQuery(format!("populate root <{root}> is not a valid prim")).coding_error());
        }
        log::debug!("Populating skel cache beneath <{root}>");

        let scene = self.scene.as_ref();
        let name = |s: &str| Token::new(s);
        let mut num_skinned = 0usize;

        self.walk(root, PopulateState::default(), |prim, kind, state| {
            // Animation first: a skeleton binding on the same prim uses it.
            if let Some(targets) = scene.relationship_targets(prim, name(tokens::SKEL_ANIMATION_SOURCE)) {
                if targets.len() > 1 {
                    log::warn!("<{prim}>.skel:animationSource has multiple targets; only the first is used.");
                }
                state.anim = targets.first().copied();
            }

            // An authored but empty binding stops inheritance.
            if let Some(targets) = scene.relationship_targets(prim, name(tokens::SKEL_SKELETON)) {
                if targets.len() > 1 {
                    log::warn!("<{prim}>.skel:skeleton has multiple targets; only the first is used.");
                }
                state.skel_query = targets.first().and_then(|&skel| {
                    let query = self.find_or_create_skel_query(prim, skel, state.anim);
                    if query.is_none() {
                        log::warn!("<{prim}> binds <{skel}>, which is not a valid skeleton.");
                    }
                    query
                });
            }

            if kind == PrimKind::Skeleton {
                self.find_or_create_skel_query(prim, prim, state.anim);
            }

            let bind_attr = |slot: &mut Option<AttributePath>, attr: &str| {
                if scene.has_attribute(prim, name(attr)) {
                    *slot = Some(AttributePath::new(prim, attr));
                }
            };
            bind_attr(&mut state.bindings.joint_indices, tokens::PRIMVARS_SKEL_JOINT_INDICES);
            bind_attr(&mut state.bindings.joint_weights, tokens::PRIMVARS_SKEL_JOINT_WEIGHTS);
            bind_attr(
                &mut state.bindings.geom_bind_transform,
                tokens::PRIMVARS_SKEL_GEOM_BIND_TRANSFORM,
            );
            bind_attr(&mut state.bindings.skinning_method, tokens::SKEL_SKINNING_METHOD);
            if let Some(joints) = scene
                .attribute(prim, name(tokens::SKEL_JOINTS), TimeCode::Default)
                .and_then(Value::into_token_array)
            {
                state.bindings.joint_order = Some(joints);
            }

            if kind.is_skinnable() && state.bindings.has_joint_influences() {
                log::trace!("Creating skinning query for <{prim}>");
                let mut bindings = state.bindings.clone();
                if scene.has_attribute(prim, name(tokens::SKEL_BLEND_SHAPES)) {
                    bindings.blend_shapes = Some(AttributePath::new(prim, tokens::SKEL_BLEND_SHAPES));
                }
                bindings.blend_shape_targets =
                    scene.relationship_targets(prim, name(tokens::SKEL_BLEND_SHAPE_TARGETS));
                self.find_or_create_skinning_query(prim, &bindings, state.skel_query.as_ref());
                num_skinned += 1;
                return false;
            }
            true
        });

        log::debug!(
            "Populated <{root}>: {num_skinned} skinned prims, {} skel queries, {} skinning queries",
            self.skel_queries.len(),
            self.skinning_queries.len()
        );
        Ok(())
    }

    fn clear(&self) {
        self.prim_skinning_queries.clear();
        self.skinning_queries.clear();
        self.skel_queries.clear();
        self.anim_queries.clear();
        self.definitions.clear();
    }
}

/// Binding state inherited down the hierarchy during population.
#[derive(Clone, Default)]
struct PopulateState {
    bindings: InfluenceBindings,
    anim: Option<Path>,
    skel_query: Option<Arc<SkeletonQuery>>,
}

// ============================================================================
// Scopes
// ============================================================================

/// Shared access to a [`CacheImpl`].
pub struct ReadScope<'a> {
    cache: &'a CacheImpl,
    _guard: RwLockReadGuard<'a, ()>,
}

impl ReadScope<'_> {
    pub fn find_or_create_skel_definition(&self, prim: Path) -> Option<Arc<SkelDefinition>> {
        self.cache.find_or_create_skel_definition(prim)
    }

    pub fn find_or_create_anim_query(&self, prim: Path) -> Option<Arc<AnimQuery>> {
        self.cache.find_or_create_anim_query(prim)
    }

    /// Finds the skeleton query stored at `key`, creating it from `skel` and
    /// the optional animation `anim` if absent.
    pub fn find_or_create_skel_query(&self, key: Path, skel: Path, anim: Option<Path>) -> Option<Arc<SkeletonQuery>> {
        self.cache.find_or_create_skel_query(key, skel, anim)
    }

    pub fn find_or_create_skinning_query(
        &self,
        prim: Path,
        bindings: &InfluenceBindings,
        skel_query: Option<&Arc<SkeletonQuery>>,
    ) -> Option<Arc<SkinningQuery>> {
        self.cache.find_or_create_skinning_query(prim, bindings, skel_query)
    }

    #[must_use]
    pub fn find_skel_query(&self, prim: Path) -> Option<Arc<SkeletonQuery>> {
        self.cache.skel_queries.get(&prim)
    }

    #[must_use]
    pub fn find_skinning_query(&self, prim: Path) -> Option<Arc<SkinningQuery>> {
        self.cache.prim_skinning_queries.get(&prim)
    }

    /// Groups the skinning queries found beneath `root` by the skeleton they
    /// are bound to, in traversal order. Prims without a skeleton binding
    /// are skipped.
    #[must_use]
    pub fn compute_skel_bindings(&self, root: Path) -> Vec<SkelBinding> {
        let mut bindings: Vec<SkelBinding> = Vec::new();
        let mut by_skeleton: FxHashMap<Path, usize> = FxHashMap::default();

        self.cache.walk(root, (), |prim, _, _| {
            let Some(query) = self.find_skinning_query(prim) else {
                return true;
            };
            if let Some(skeleton) = query.skel_binding() {
                let index = *by_skeleton.entry(skeleton).or_insert_with(|| {
                    bindings.push(SkelBinding {
                        skeleton,
                        skinning_queries: Vec::new(),
                    });
                    bindings.len() - 1
                });
                bindings[index].skinning_queries.push(query);
            }
            false
        });
        bindings
    }
}

/// Exclusive access to a [`CacheImpl`].
pub struct WriteScope<'a> {
    cache: &'a CacheImpl,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl WriteScope<'_> {
    /// Discovers every skeleton, animation and skinning binding beneath
    /// `root` and caches the corresponding queries.
    ///
    /// Prims below a prototype are resolved once, with the bindings
    /// inherited through the first instance that reaches them. Entries are
    /// insert-if-absent, so later instances of the same prototype (in this
    /// or a later populate) share those queries even when they sit under a
    /// different skeleton binding.
    pub fn populate(&self, root: Path) -> Result<()> {
        self.cache.populate(root)
    }

    /// Drops every cached value. Queries already handed out stay usable.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

/// A skeleton and the skinned prims bound to it.
#[derive(Debug, Clone)]
pub struct SkelBinding {
    pub skeleton: Path,
    pub skinning_queries: Vec<Arc<SkinningQuery>>,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn once_map_builds_each_key_once() {
        let map: OnceMap<u32, Arc<u32>> = OnceMap::new();
        let calls = AtomicUsize::new(0);
        let make = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Some(Arc::new(7))
        };
        let a = map.get_or_create(1, make);
        let b = map.get_or_create(1, make);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a.expect("built"), &b.expect("cached")));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn failed_construction_is_remembered() {
        let map: OnceMap<u32, Arc<u32>> = OnceMap::new();
        assert!(map.get_or_create(1, || None).is_none());
        assert!(map.get_or_create(1, || Some(Arc::new(1))).is_none());
        assert_eq!(map.len(), 0);
        map.clear();
        assert!(map.get_or_create(1, || Some(Arc::new(1))).is_some());
    }
}
