//! Skinning of one prim: validated influence primvars plus the skinning
//! entry points that consume them.

use std::fmt;

use glam::{DMat3, DMat4, Vec3};

use super::anim_mapper::AnimMapper;
use super::blend_shape_query::BlendShapeQuery;
use super::skeleton_query::SkeletonQuery;
use crate::errors::{Result, SkelError};
use crate::math::normal_matrix;
use crate::scene::{
    AttributePath, Interpolation, Path, SceneRef, TimeCode, Token, Value,
    compute_flattened_primvar, tokens,
};
use crate::skinning::influences::validate_array_shape;
use crate::skinning::{
    SkinningMethod, expand_constant_influences_to_varying, skin_face_varying_normals,
    skin_normals, skin_points, skin_transform,
};

/// Binding properties that apply to a skinnable prim, found on the prim
/// itself or inherited from an ancestor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct InfluenceBindings {
    pub joint_indices: Option<AttributePath>,
    pub joint_weights: Option<AttributePath>,
    pub geom_bind_transform: Option<AttributePath>,
    pub skinning_method: Option<AttributePath>,
    /// Custom joint order the influences index into.
    pub joint_order: Option<Vec<Token>>,
    /// `skel:blendShapes` of the skinned prim itself. Not inherited.
    pub blend_shapes: Option<AttributePath>,
    /// `skel:blendShapeTargets` of the skinned prim itself. Not inherited.
    pub blend_shape_targets: Option<Vec<Path>>,
}

impl InfluenceBindings {
    #[must_use]
    pub fn has_joint_influences(&self) -> bool {
        self.joint_indices.is_some() && self.joint_weights.is_some()
    }

    #[must_use]
    pub fn has_blend_shapes(&self) -> bool {
        self.blend_shapes.is_some() && self.blend_shape_targets.is_some()
    }
}

/// Joint influences of a skinned prim and the transforms needed to deform
/// it.
///
/// Validity is decided once on construction. An invalid query is kept as an
/// inert value: every compute method on it fails with a coding error.
pub struct SkinningQuery {
    scene: SceneRef,
    prim: Path,
    skel_binding: Option<Path>,
    bindings: InfluenceBindings,
    joint_mapper: Option<AnimMapper>,
    blend_shape_order: Vec<Token>,
    blend_shape_mapper: Option<AnimMapper>,
    blend_shapes: Option<BlendShapeQuery>,
    skinning_method: SkinningMethod,
    num_influences: usize,
    interpolation: Interpolation,
    valid: bool,
}

impl SkinningQuery {
    /// Builds the query for `prim`.
    ///
    /// `skel_joint_order` is the joint order of the bound skeleton; when
    /// `bindings.joint_order` is authored, skinning transforms are remapped
    /// from the skeleton's order into it. `anim_blend_shape_order` is the
    /// blend shape order of the skeleton's animation, whose weights are
    /// remapped onto this prim's `skel:blendShapes`.
    #[must_use]
    pub fn new(
        scene: SceneRef,
        prim: Path,
        skel_binding: Option<Path>,
        skel_joint_order: &[Token],
        anim_blend_shape_order: &[Token],
        bindings: InfluenceBindings,
    ) -> Self {
        let joint_mapper = bindings
            .joint_order
            .as_ref()
            .map(|order| AnimMapper::new(skel_joint_order, order));

        let method_token = bindings
            .skinning_method
            .and_then(|attr| attr.get(scene.as_ref(), TimeCode::Default))
            .and_then(|v| v.as_token());
        let skinning_method = match method_token {
            Some(token) => SkinningMethod::from_token(token.as_str()).unwrap_or_default(),
            None => SkinningMethod::default(),
        };

        let mut query = Self {
            scene,
            prim,
            skel_binding,
            bindings,
            joint_mapper,
            blend_shape_order: Vec::new(),
            blend_shape_mapper: None,
            blend_shapes: None,
            skinning_method,
            num_influences: 0,
            interpolation: Interpolation::Constant,
            valid: false,
        };
        query.init_influences();
        query.init_blend_shapes(anim_blend_shape_order);
        query
    }

    fn init_blend_shapes(&mut self, anim_blend_shape_order: &[Token]) {
        let (Some(names), Some(targets)) = (self.bindings.blend_shapes, &self.bindings.blend_shape_targets) else {
            return;
        };
        let order = names
            .get(self.scene.as_ref(), TimeCode::Default)
            .and_then(Value::into_token_array)
            .unwrap_or_default();
        if order.len() != targets.len() {
            log::warn!(
                "<{}>: size of {} ({}) != size of {} ({}).",
                self.prim,
                tokens::SKEL_BLEND_SHAPES,
                order.len(),
                tokens::SKEL_BLEND_SHAPE_TARGETS,
                targets.len()
            );
            return;
        }
        let Some(query) = BlendShapeQuery::new(self.scene.as_ref(), targets) else {
            log::warn!("<{}>: unresolvable {}.", self.prim, tokens::SKEL_BLEND_SHAPE_TARGETS);
            return;
        };
        self.blend_shape_mapper = Some(AnimMapper::new(anim_blend_shape_order, &order));
        self.blend_shape_order = order;
        self.blend_shapes = Some(query);
    }

    fn init_influences(&mut self) {
        let Some(indices) = self.bindings.joint_indices else {
            return;
        };
        let scene = self.scene.as_ref();
        let indices_info = indices.primvar_info(scene).unwrap_or_default();
        self.num_influences = indices_info.element_size;
        self.interpolation = indices_info.interpolation;

        let Some(weights) = self.bindings.joint_weights else {
            log::warn!(
                "Found jointIndices at <{}>, but no jointWeights were found.",
                self.prim
            );
            return;
        };
        let weights_info = weights.primvar_info(scene).unwrap_or_default();

        if self.num_influences == 0 {
            log::warn!(
                "<{}>: invalid element size [{}]: element size must be greater than 0.",
                self.prim,
                self.num_influences
            );
            return;
        }
        if weights_info.element_size != self.num_influences {
            log::warn!(
                "<{}>: jointIndices element size ({}) != jointWeights element size ({}).",
                self.prim,
                self.num_influences,
                weights_info.element_size
            );
            return;
        }
        if weights_info.interpolation != self.interpolation {
            log::warn!(
                "<{}>: jointIndices interpolation ({}) != jointWeights interpolation ({}).",
                self.prim,
                self.interpolation,
                weights_info.interpolation
            );
            return;
        }
        if !matches!(self.interpolation, Interpolation::Constant | Interpolation::Vertex) {
            log::warn!(
                "<{}>: an invalid interpolation ({}) was set for jointIndices and \
                 jointWeights. Skinning requires either 'vertex' or 'constant' interpolation.",
                self.prim,
                self.interpolation
            );
            return;
        }
        self.valid = true;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The prim the query was built for. Prims whose bindings resolve to the
    /// same properties share one query.
    #[inline]
    #[must_use]
    pub fn prim(&self) -> Path {
        self.prim
    }

    /// Skeleton this prim is bound to, if any.
    #[inline]
    #[must_use]
    pub fn skel_binding(&self) -> Option<Path> {
        self.skel_binding
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[inline]
    #[must_use]
    pub fn bindings(&self) -> &InfluenceBindings {
        &self.bindings
    }

    #[inline]
    #[must_use]
    pub fn has_joint_influences(&self) -> bool {
        self.bindings.has_joint_influences()
    }

    #[inline]
    #[must_use]
    pub fn num_influences_per_component(&self) -> usize {
        self.num_influences
    }

    #[inline]
    #[must_use]
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Constant influences apply to the prim as a whole.
    #[inline]
    #[must_use]
    pub fn is_rigidly_deformed(&self) -> bool {
        self.interpolation == Interpolation::Constant
    }

    #[inline]
    #[must_use]
    pub fn skinning_method(&self) -> SkinningMethod {
        self.skinning_method
    }

    #[inline]
    #[must_use]
    pub fn joint_order(&self) -> Option<&[Token]> {
        self.bindings.joint_order.as_deref()
    }

    /// Maps skeleton-ordered transforms into this prim's joint order.
    #[inline]
    #[must_use]
    pub fn joint_mapper(&self) -> Option<&AnimMapper> {
        self.joint_mapper.as_ref()
    }

    /// Whether resolved blend shape targets are bound to the prim.
    #[inline]
    #[must_use]
    pub fn has_blend_shapes(&self) -> bool {
        self.blend_shapes.is_some()
    }

    /// This prim's `skel:blendShapes`, empty without blend shapes.
    #[inline]
    #[must_use]
    pub fn blend_shape_order(&self) -> &[Token] {
        &self.blend_shape_order
    }

    /// Maps animation-ordered blend shape weights into
    /// [`blend_shape_order`](Self::blend_shape_order).
    #[inline]
    #[must_use]
    pub fn blend_shape_mapper(&self) -> Option<&AnimMapper> {
        self.blend_shape_mapper.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn blend_shape_query(&self) -> Option<&BlendShapeQuery> {
        self.blend_shapes.as_ref()
    }

    /// The geom bind transform at `time`, or identity when unauthored.
    #[must_use]
    pub fn geom_bind_transform(&self, time: TimeCode) -> DMat4 {
        self.bindings
            .geom_bind_transform
            .and_then(|attr| attr.get(self.scene.as_ref(), time))
            .and_then(|v| v.as_matrix())
            .unwrap_or(DMat4::IDENTITY)
    }

    fn check_valid(&self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(SkelError::InvalidQuery(self.to_string()).coding_error())
        }
    }

    // ========================================================================
    // Influences
    // ========================================================================

    /// Flattened joint indices and weights as authored.
    pub fn compute_joint_influences(&self, time: TimeCode) -> Result<(Vec<i32>, Vec<f32>)> {
        self.check_valid()?;

        let indices = self.flattened(self.bindings.joint_indices, time, Value::into_int_array)?;
        let weights = self.flattened(self.bindings.joint_weights, time, Value::into_float_array)?;

        SkelError::check_size("jointIndices", indices.len(), "jointWeights", weights.len())?;
        validate_array_shape(indices.len(), self.num_influences)?;
        if self.is_rigidly_deformed() {
            SkelError::check_size(
                "constant jointIndices",
                indices.len(),
                "numInfluencesPerComponent",
                self.num_influences,
            )?;
        }
        Ok((indices, weights))
    }

    /// Joint indices and weights with one influence set per point. Constant
    /// influences are broadcast to every point.
    pub fn compute_varying_joint_influences(
        &self,
        num_points: usize,
        time: TimeCode,
    ) -> Result<(Vec<i32>, Vec<f32>)> {
        let (mut indices, mut weights) = self.compute_joint_influences(time)?;
        if self.is_rigidly_deformed() {
            expand_constant_influences_to_varying(&mut indices, num_points);
            expand_constant_influences_to_varying(&mut weights, num_points);
        } else {
            SkelError::check_size(
                "jointIndices",
                indices.len(),
                "numPoints * numInfluencesPerComponent",
                num_points * self.num_influences,
            )?;
        }
        Ok((indices, weights))
    }

    fn flattened<T>(
        &self,
        attr: Option<AttributePath>,
        time: TimeCode,
        extract: fn(Value) -> Option<T>,
    ) -> Result<T> {
        let missing = |name: String| SkelError::MissingValue {
            prim: self.prim.to_string(),
            attribute: name,
        };
        let attr = attr.ok_or_else(|| missing("influences".to_string()).warn())?;
        compute_flattened_primvar(self.scene.as_ref(), attr.prim, attr.name, time)
            .and_then(extract)
            .ok_or_else(|| missing(attr.name.to_string()).warn())
    }

    // ========================================================================
    // Skinning
    // ========================================================================

    /// Skeleton-ordered transforms reordered into this prim's joint order.
    fn ordered_transforms<'a>(&self, xforms: &'a [DMat4], scratch: &'a mut Vec<DMat4>) -> Result<&'a [DMat4]> {
        match &self.joint_mapper {
            Some(mapper) if !mapper.is_identity() => {
                mapper.remap_transforms(xforms, scratch, 1)?;
                Ok(scratch.as_slice())
            }
            _ => Ok(xforms),
        }
    }

    /// Deforms `points` by skeleton-ordered skinning transforms `xforms`.
    pub fn compute_skinned_points(&self, xforms: &[DMat4], points: &mut [Vec3], time: TimeCode) -> Result<()> {
        self.check_valid()?;
        let mut scratch = Vec::new();
        let xforms = self.ordered_transforms(xforms, &mut scratch)?;
        let (indices, weights) = self.compute_varying_joint_influences(points.len(), time)?;
        skin_points(
            self.skinning_method,
            &self.geom_bind_transform(time),
            xforms,
            &indices,
            &weights,
            self.num_influences,
            points,
            false,
        )
    }

    /// Normal transforms (inverse transpose) of the ordered skinning
    /// transforms and of the geom bind transform.
    fn normal_transforms(&self, xforms: &[DMat4], time: TimeCode) -> Result<(DMat3, Vec<DMat3>)> {
        let mut scratch = Vec::new();
        let xforms = self.ordered_transforms(xforms, &mut scratch)?;
        let geom_bind = normal_matrix(&self.geom_bind_transform(time));
        Ok((geom_bind, xforms.iter().map(normal_matrix).collect()))
    }

    /// Deforms per-point `normals` by skeleton-ordered skinning transforms
    /// `xforms`.
    pub fn compute_skinned_normals(&self, xforms: &[DMat4], normals: &mut [Vec3], time: TimeCode) -> Result<()> {
        self.check_valid()?;
        let (geom_bind, normal_xforms) = self.normal_transforms(xforms, time)?;
        let (indices, weights) = self.compute_varying_joint_influences(normals.len(), time)?;
        skin_normals(
            self.skinning_method,
            &geom_bind,
            &normal_xforms,
            &indices,
            &weights,
            self.num_influences,
            normals,
            false,
        )
    }

    /// Deforms face-varying `normals`. Normal `i` follows point
    /// `face_vertex_indices[i]` of a mesh with `num_points` points.
    pub fn compute_skinned_face_varying_normals(
        &self,
        xforms: &[DMat4],
        face_vertex_indices: &[i32],
        num_points: usize,
        normals: &mut [Vec3],
        time: TimeCode,
    ) -> Result<()> {
        self.check_valid()?;
        let (geom_bind, normal_xforms) = self.normal_transforms(xforms, time)?;
        let (indices, weights) = self.compute_varying_joint_influences(num_points, time)?;
        skin_face_varying_normals(
            self.skinning_method,
            &geom_bind,
            &normal_xforms,
            &indices,
            &weights,
            self.num_influences,
            face_vertex_indices,
            normals,
            false,
        )
    }

    /// Animation-ordered blend shape weights remapped into this prim's
    /// blend shape order. Shapes the animation does not drive get zero.
    pub fn compute_blend_shape_weights(&self, anim_weights: &[f32]) -> Result<Vec<f32>> {
        let Some(mapper) = &self.blend_shape_mapper else {
            return Err(SkelError::MissingValue {
                prim: self.prim.to_string(),
                attribute: tokens::SKEL_BLEND_SHAPES.to_string(),
            }
            .warn());
        };
        let mut weights = vec![0.0; self.blend_shape_order.len()];
        mapper.remap(anim_weights, &mut weights, 1, Some(&0.0))?;
        Ok(weights)
    }

    /// Prim-ordered blend shape weights driven by `skel_query`'s animation
    /// at `time`, or `None` when no animated weights apply.
    fn animated_blend_shape_weights(&self, skel_query: &SkeletonQuery, time: TimeCode) -> Result<Option<Vec<f32>>> {
        if !self.has_blend_shapes() {
            return Ok(None);
        }
        let Some(anim) = skel_query
            .anim_query()
            .filter(|a| !a.blend_shape_order().is_empty())
        else {
            return Ok(None);
        };
        let anim_weights = anim.compute_blend_shape_weights(time)?;
        self.compute_blend_shape_weights(&anim_weights).map(Some)
    }

    /// Full deformation of `points` at `time`: the animation's blend shape
    /// weights are applied first, then the points are skinned by
    /// `skel_query`'s skinning transforms. `points` is left untouched on
    /// failure.
    pub fn compute_deformed_points(&self, skel_query: &SkeletonQuery, points: &mut [Vec3], time: TimeCode) -> Result<()> {
        self.check_valid()?;
        let mut deformed = points.to_vec();
        if let Some(weights) = self.animated_blend_shape_weights(skel_query, time)?
            && let Some(shapes) = &self.blend_shapes
        {
            shapes.compute_deformed_points(&weights, &mut deformed)?;
        }
        let xforms = skel_query.compute_skinning_transforms(time)?;
        self.compute_skinned_points(&xforms, &mut deformed, time)?;
        points.copy_from_slice(&deformed);
        Ok(())
    }

    /// [`compute_deformed_points`](Self::compute_deformed_points) for
    /// per-point normals.
    pub fn compute_deformed_normals(&self, skel_query: &SkeletonQuery, normals: &mut [Vec3], time: TimeCode) -> Result<()> {
        self.check_valid()?;
        let mut deformed = normals.to_vec();
        if let Some(weights) = self.animated_blend_shape_weights(skel_query, time)?
            && let Some(shapes) = &self.blend_shapes
        {
            shapes.compute_deformed_normals(&weights, &mut deformed)?;
        }
        let xforms = skel_query.compute_skinning_transforms(time)?;
        self.compute_skinned_normals(&xforms, &mut deformed, time)?;
        normals.copy_from_slice(&deformed);
        Ok(())
    }

    /// Skins the prim's geom bind transform. Only valid for rigidly
    /// deformed prims.
    pub fn compute_skinned_transform(&self, xforms: &[DMat4], time: TimeCode) -> Result<DMat4> {
        self.check_valid()?;
        if !self.is_rigidly_deformed() {
            return Err(SkelError::NotRigidlyDeformed(self.prim.to_string()).coding_error());
        }
        let mut scratch = Vec::new();
        let xforms = self.ordered_transforms(xforms, &mut scratch)?;
        let (indices, weights) = self.compute_joint_influences(time)?;
        skin_transform(
            self.skinning_method,
            &self.geom_bind_transform(time),
            xforms,
            &indices,
            &weights,
        )
    }
}

impl fmt::Display for SkinningQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SkinningQuery <{}>", self.prim)
    }
}

impl fmt::Debug for SkinningQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkinningQuery")
            .field("prim", &self.prim)
            .field("skel_binding", &self.skel_binding)
            .field("valid", &self.valid)
            .field("num_influences", &self.num_influences)
            .field("interpolation", &self.interpolation)
            .field("skinning_method", &self.skinning_method)
            .field("blend_shapes", &self.blend_shape_order)
            .finish_non_exhaustive()
    }
}
