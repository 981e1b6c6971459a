//! In-memory scene graph.
//!
//! [`Stage`] stores prims in a slotmap arena with a path lookup table, the
//! same layout the renderer uses for its node hierarchy. It is populated up
//! front (tests, benches, importers) and then shared read-only behind an
//! `Arc` as a [`SceneGraph`].

use glam::{DMat4, Quat, Vec3};
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use super::path::{Path, Token};
use super::tokens;
use super::value::Value;
use super::{Interpolation, PrimKind, PrimvarInfo, SceneGraph, TimeCode};

new_key_type! {
    /// Arena handle of a prim.
    pub struct PrimKey;
}

#[derive(Debug, Clone, Default)]
struct Attribute {
    default: Option<Value>,
    /// Sorted by time.
    samples: Vec<(f64, Value)>,
    primvar: Option<PrimvarInfo>,
}

impl Attribute {
    /// Held interpolation: the last sample at or before `t`, or the first
    /// sample when `t` precedes all of them.
    fn resolve(&self, time: TimeCode) -> Option<&Value> {
        match time {
            TimeCode::Default => self.default.as_ref(),
            TimeCode::At(t) => {
                if self.samples.is_empty() {
                    return self.default.as_ref();
                }
                let upper = self.samples.partition_point(|(st, _)| *st <= t);
                let i = upper.saturating_sub(1);
                self.samples.get(i).map(|(_, v)| v)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Prim {
    path: Path,
    kind: PrimKind,
    active: bool,
    parent: Option<PrimKey>,
    children: Vec<PrimKey>,
    attributes: FxHashMap<Token, Attribute>,
    relationships: FxHashMap<Token, Vec<Path>>,
    prototype: Option<Path>,
}

impl Prim {
    fn new(path: Path, kind: PrimKind, parent: Option<PrimKey>) -> Self {
        Self {
            path,
            kind,
            active: true,
            parent,
            children: Vec::new(),
            attributes: FxHashMap::default(),
            relationships: FxHashMap::default(),
            prototype: None,
        }
    }
}

/// An editable, in-memory [`SceneGraph`].
#[derive(Debug, Clone)]
pub struct Stage {
    prims: SlotMap<PrimKey, Prim>,
    lookup: FxHashMap<Path, PrimKey>,
    root: PrimKey,
}

impl Default for Stage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage {
    /// Creates a stage holding only the absolute root `/`, which behaves as
    /// a traversable scope.
    #[must_use]
    pub fn new() -> Self {
        let mut prims = SlotMap::with_key();
        let root_path = Path::absolute_root();
        let root = prims.insert(Prim::new(root_path, PrimKind::Scope, None));
        let mut lookup = FxHashMap::default();
        lookup.insert(root_path, root);
        Self {
            prims,
            lookup,
            root,
        }
    }

    #[must_use]
    pub fn pseudo_root(&self) -> Path {
        self.prims[self.root].path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.prims.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prims.len() <= 1
    }

    fn prim(&self, path: Path) -> Option<&Prim> {
        self.lookup.get(&path).and_then(|&k| self.prims.get(k))
    }

    fn prim_mut(&mut self, path: Path) -> Option<&mut Prim> {
        let key = *self.lookup.get(&path)?;
        self.prims.get_mut(key)
    }

    /// Defines (or re-types) a prim. Missing ancestors are created as
    /// [`PrimKind::Xform`].
    pub fn define_prim(&mut self, path: impl Into<Path>, kind: PrimKind) -> Path {
        let path = path.into();
        if let Some(prim) = self.prim_mut(path) {
            prim.kind = kind;
            return path;
        }
        let Some(parent_path) = path.parent() else {
            log::warn!("Cannot define prim at relative location <{path}>");
            return path;
        };
        if !self.lookup.contains_key(&parent_path) {
            self.define_prim(parent_path, PrimKind::Xform);
        }
        let parent = self.lookup[&parent_path];
        let key = self.prims.insert(Prim::new(path, kind, Some(parent)));
        self.prims[parent].children.push(key);
        self.lookup.insert(path, key);
        path
    }

    pub fn set_active(&mut self, path: Path, active: bool) {
        if let Some(prim) = self.prim_mut(path) {
            prim.active = active;
        }
    }

    /// Makes `path` an instance of `prototype`: traversal substitutes the
    /// prototype's children for the instance's own.
    pub fn set_instance_prototype(&mut self, path: Path, prototype: Path) {
        if let Some(prim) = self.prim_mut(path) {
            prim.prototype = Some(prototype);
        }
    }

    fn attribute_mut(&mut self, path: Path, name: Token) -> Option<&mut Attribute> {
        let Some(prim) = self.prim_mut(path) else {
            log::warn!("Cannot author '{name}' on missing prim <{path}>");
            return None;
        };
        Some(prim.attributes.entry(name).or_default())
    }

    pub fn set_attribute(&mut self, path: Path, name: impl Into<Token>, value: impl Into<Value>) {
        if let Some(attr) = self.attribute_mut(path, name.into()) {
            attr.default = Some(value.into());
        }
    }

    pub fn set_time_sample(
        &mut self,
        path: Path,
        name: impl Into<Token>,
        time: f64,
        value: impl Into<Value>,
    ) {
        if let Some(attr) = self.attribute_mut(path, name.into()) {
            let value = value.into();
            match attr.samples.binary_search_by(|(t, _)| t.total_cmp(&time)) {
                Ok(i) => attr.samples[i].1 = value,
                Err(i) => attr.samples.insert(i, (time, value)),
            }
        }
    }

    pub fn set_primvar(
        &mut self,
        path: Path,
        name: impl Into<Token>,
        value: impl Into<Value>,
        info: PrimvarInfo,
    ) {
        if let Some(attr) = self.attribute_mut(path, name.into()) {
            attr.default = Some(value.into());
            attr.primvar = Some(info);
        }
    }

    /// Authors `<name>:indices` and marks the primvar as indexed.
    pub fn set_primvar_indices(&mut self, path: Path, name: impl Into<Token>, indices: Vec<i32>) {
        let name = name.into();
        let indices_name = Token::new(&format!("{name}:indices"));
        self.set_attribute(path, indices_name, indices);
        if let Some(info) = self
            .attribute_mut(path, name)
            .and_then(|a| a.primvar.as_mut())
        {
            info.indexed = true;
        }
    }

    pub fn set_relationship(&mut self, path: Path, name: impl Into<Token>, targets: Vec<Path>) {
        if let Some(prim) = self.prim_mut(path) {
            prim.relationships.insert(name.into(), targets);
        }
    }

    // ========================================================================
    // Skeleton authoring helpers
    // ========================================================================

    /// Defines a skeleton with its joint paths and bind/rest transforms.
    pub fn define_skeleton(
        &mut self,
        path: impl Into<Path>,
        joints: &[&str],
        bind_transforms: Vec<DMat4>,
        rest_transforms: Vec<DMat4>,
    ) -> Path {
        let path = self.define_prim(path, PrimKind::Skeleton);
        self.set_attribute(path, tokens::JOINTS, super::path::tokens(joints));
        self.set_attribute(path, tokens::BIND_TRANSFORMS, bind_transforms);
        self.set_attribute(path, tokens::REST_TRANSFORMS, rest_transforms);
        path
    }

    /// Defines an animation with its joint order and default-time components.
    pub fn define_animation(
        &mut self,
        path: impl Into<Path>,
        joints: &[&str],
        translations: Vec<Vec3>,
        rotations: Vec<Quat>,
        scales: Vec<Vec3>,
    ) -> Path {
        let path = self.define_prim(path, PrimKind::SkelAnimation);
        self.set_attribute(path, tokens::JOINTS, super::path::tokens(joints));
        self.set_attribute(path, tokens::TRANSLATIONS, translations);
        self.set_attribute(path, tokens::ROTATIONS, rotations);
        self.set_attribute(path, tokens::SCALES, scales);
        path
    }

    pub fn bind_skeleton(&mut self, prim: Path, skeleton: Path) {
        self.set_relationship(prim, tokens::SKEL_SKELETON, vec![skeleton]);
    }

    pub fn bind_animation(&mut self, prim: Path, animation: Path) {
        self.set_relationship(prim, tokens::SKEL_ANIMATION_SOURCE, vec![animation]);
    }

    /// Authors the joint index and weight primvars with a shared
    /// interpolation and element size.
    pub fn set_joint_influences(
        &mut self,
        prim: Path,
        indices: Vec<i32>,
        weights: Vec<f32>,
        element_size: usize,
        interpolation: Interpolation,
    ) {
        let info = PrimvarInfo::new(interpolation, element_size);
        self.set_primvar(prim, tokens::PRIMVARS_SKEL_JOINT_INDICES, indices, info);
        self.set_primvar(prim, tokens::PRIMVARS_SKEL_JOINT_WEIGHTS, weights, info);
    }

    /// Defines a blend shape. Empty `point_indices` means one offset per
    /// point of the target mesh.
    pub fn define_blend_shape(
        &mut self,
        path: impl Into<Path>,
        offsets: Vec<Vec3>,
        point_indices: Vec<i32>,
    ) -> Path {
        let path = self.define_prim(path, PrimKind::BlendShape);
        self.set_attribute(path, tokens::OFFSETS, offsets);
        if !point_indices.is_empty() {
            self.set_attribute(path, tokens::POINT_INDICES, point_indices);
        }
        path
    }

    /// Authors `skel:blendShapes` and `skel:blendShapeTargets` on `prim`,
    /// pairing each name with the target at the same position.
    pub fn bind_blend_shapes(&mut self, prim: Path, names: &[&str], targets: Vec<Path>) {
        self.set_attribute(prim, tokens::SKEL_BLEND_SHAPES, super::path::tokens(names));
        self.set_relationship(prim, tokens::SKEL_BLEND_SHAPE_TARGETS, targets);
    }

    pub fn set_geom_bind_transform(&mut self, prim: Path, xform: DMat4) {
        self.set_primvar(
            prim,
            tokens::PRIMVARS_SKEL_GEOM_BIND_TRANSFORM,
            xform,
            PrimvarInfo::new(Interpolation::Constant, 1),
        );
    }
}

impl SceneGraph for Stage {
    fn prim_kind(&self, path: Path) -> Option<PrimKind> {
        self.prim(path).map(|p| p.kind)
    }

    fn is_active(&self, path: Path) -> bool {
        self.prim(path).is_some_and(|p| p.active)
    }

    fn children(&self, path: Path) -> Vec<Path> {
        self.prim(path)
            .map(|p| {
                p.children
                    .iter()
                    .filter_map(|&k| self.prims.get(k).map(|c| c.path))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn instance_prototype(&self, path: Path) -> Option<Path> {
        self.prim(path).and_then(|p| p.prototype)
    }

    fn relationship_targets(&self, path: Path, name: Token) -> Option<Vec<Path>> {
        self.prim(path)?.relationships.get(&name).cloned()
    }

    fn attribute(&self, path: Path, name: Token, time: TimeCode) -> Option<Value> {
        self.prim(path)?.attributes.get(&name)?.resolve(time).cloned()
    }

    fn has_attribute(&self, path: Path, name: Token) -> bool {
        self.prim(path).is_some_and(|p| {
            p.attributes
                .get(&name)
                .is_some_and(|a| a.default.is_some() || !a.samples.is_empty())
        })
    }

    fn time_samples(&self, path: Path, name: Token) -> Vec<f64> {
        self.prim(path)
            .and_then(|p| p.attributes.get(&name))
            .map(|a| a.samples.iter().map(|(t, _)| *t).collect())
            .unwrap_or_default()
    }

    fn primvar_info(&self, path: Path, name: Token) -> Option<PrimvarInfo> {
        self.prim(path)?.attributes.get(&name)?.primvar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_creates_ancestors() {
        let mut stage = Stage::new();
        let mesh = stage.define_prim("/Root/Geom/Mesh", PrimKind::Gprim);
        assert_eq!(stage.prim_kind(Path::new("/Root")), Some(PrimKind::Xform));
        assert_eq!(stage.children(Path::new("/Root/Geom")), vec![mesh]);
        assert_eq!(stage.children(stage.pseudo_root()), vec![Path::new("/Root")]);
    }

    #[test]
    fn held_interpolation() {
        let mut stage = Stage::new();
        let p = stage.define_prim("/Anim", PrimKind::SkelAnimation);
        stage.set_time_sample(p, "w", 10.0, vec![1.0f32]);
        stage.set_time_sample(p, "w", 0.0, vec![0.0f32]);
        let at = |t: f64| {
            stage
                .attribute(p, Token::new("w"), TimeCode::At(t))
                .and_then(Value::into_float_array)
        };
        assert_eq!(at(-5.0), Some(vec![0.0]));
        assert_eq!(at(5.0), Some(vec![0.0]));
        assert_eq!(at(10.0), Some(vec![1.0]));
        assert_eq!(at(50.0), Some(vec![1.0]));
        assert_eq!(stage.time_samples(p, Token::new("w")), vec![0.0, 10.0]);
        // No default authored.
        assert!(stage.attribute(p, Token::new("w"), TimeCode::Default).is_none());
    }

    #[test]
    fn unauthored_relationship_is_none() {
        let mut stage = Stage::new();
        let p = stage.define_prim("/A", PrimKind::Xform);
        assert!(stage.relationship_targets(p, Token::new(tokens::SKEL_SKELETON)).is_none());
        stage.set_relationship(p, tokens::SKEL_SKELETON, vec![Path::new("/S1"), Path::new("/S2")]);
        assert_eq!(
            stage.first_target(p, Token::new(tokens::SKEL_SKELETON)),
            Some(Path::new("/S1"))
        );
    }
}
