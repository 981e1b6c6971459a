//! Scene Graph Boundary
//!
//! The skeleton core never owns scene data. It reads prims, attributes,
//! relationships and primvar metadata through the [`SceneGraph`] trait,
//! keyed by interned [`Path`]s and [`Token`]s.
//!
//! - [`path`]: interned locations and names
//! - [`value`]: the attribute value enum
//! - [`stage`]: an in-memory [`SceneGraph`] arena
//! - [`tokens`]: attribute and relationship names

pub mod path;
pub mod stage;
pub mod tokens;
pub mod value;

use std::fmt;
use std::sync::Arc;

pub use path::{Path, Token};
pub use stage::Stage;
pub use value::Value;

/// Shared handle to a scene graph, held by definitions and queries.
pub type SceneRef = Arc<dyn SceneGraph>;

// ============================================================================
// Time
// ============================================================================

/// The time at which an attribute is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TimeCode {
    /// The authored default value, ignoring time samples.
    #[default]
    Default,
    /// A time sample, resolved with held interpolation.
    At(f64),
}

impl TimeCode {
    #[inline]
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, TimeCode::Default)
    }
}

impl From<f64> for TimeCode {
    fn from(t: f64) -> Self {
        TimeCode::At(t)
    }
}

impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeCode::Default => f.write_str("DEFAULT"),
            TimeCode::At(t) => write!(f, "{t}"),
        }
    }
}

// ============================================================================
// Primvars
// ============================================================================

/// How primvar elements map onto a primitive's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interpolation {
    #[default]
    Constant,
    Uniform,
    Varying,
    Vertex,
    FaceVarying,
}

impl Interpolation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Interpolation::Constant => "constant",
            Interpolation::Uniform => "uniform",
            Interpolation::Varying => "varying",
            Interpolation::Vertex => "vertex",
            Interpolation::FaceVarying => "faceVarying",
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primvar metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimvarInfo {
    pub interpolation: Interpolation,
    /// Number of values per component. Unauthored element sizes are 1.
    pub element_size: usize,
    /// Whether values are indexed through a `<name>:indices` attribute.
    pub indexed: bool,
}

impl Default for PrimvarInfo {
    /// Unauthored primvar metadata: constant, one value per component.
    fn default() -> Self {
        Self::new(Interpolation::Constant, 1)
    }
}

impl PrimvarInfo {
    #[must_use]
    pub fn new(interpolation: Interpolation, element_size: usize) -> Self {
        Self {
            interpolation,
            element_size,
            indexed: false,
        }
    }
}

/// A property address: the prim that holds it and its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributePath {
    pub prim: Path,
    pub name: Token,
}

impl AttributePath {
    #[must_use]
    pub fn new(prim: Path, name: impl Into<Token>) -> Self {
        Self {
            prim,
            name: name.into(),
        }
    }

    /// Resolves the attribute on `scene`.
    #[must_use]
    pub fn get(&self, scene: &dyn SceneGraph, time: TimeCode) -> Option<Value> {
        scene.attribute(self.prim, self.name, time)
    }

    #[must_use]
    pub fn primvar_info(&self, scene: &dyn SceneGraph) -> Option<PrimvarInfo> {
        scene.primvar_info(self.prim, self.name)
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.prim, self.name)
    }
}

// ============================================================================
// Prim classification
// ============================================================================

/// Schema classification of a prim, as far as the skeleton core cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimKind {
    SkelRoot,
    Skeleton,
    SkelAnimation,
    /// Point offsets targeted by a skinned prim's `skel:blendShapeTargets`.
    BlendShape,
    /// Boundable geometry (meshes, curves, points...).
    Gprim,
    /// Transformable grouping prim.
    Xform,
    /// Non-transformable grouping prim.
    Scope,
    /// Anything else (materials, shaders, untyped prims).
    Other,
}

impl PrimKind {
    /// Renderable prims. Traversal prunes everything else.
    #[must_use]
    pub fn is_imageable(self) -> bool {
        !matches!(
            self,
            PrimKind::SkelAnimation | PrimKind::BlendShape | PrimKind::Other
        )
    }

    #[must_use]
    pub fn is_boundable(self) -> bool {
        matches!(
            self,
            PrimKind::SkelRoot | PrimKind::Skeleton | PrimKind::Gprim
        )
    }

    /// Boundable prims other than skel roots and skeletons may be skinned.
    #[must_use]
    pub fn is_skinnable(self) -> bool {
        self.is_boundable() && !matches!(self, PrimKind::SkelRoot | PrimKind::Skeleton)
    }
}

// ============================================================================
// SceneGraph trait
// ============================================================================

/// Read access to a hierarchical scene.
///
/// Implementations must be safe to query from many threads at once; the
/// cache resolves bindings in parallel readers.
pub trait SceneGraph: Send + Sync {
    /// Classification of the prim at `path`, or `None` if there is no prim.
    fn prim_kind(&self, path: Path) -> Option<PrimKind>;

    fn is_active(&self, path: Path) -> bool;

    /// Child locations in authored order.
    fn children(&self, path: Path) -> Vec<Path>;

    /// The prototype whose children stand in for an instance's children.
    fn instance_prototype(&self, path: Path) -> Option<Path>;

    /// Targets of an authored relationship, or `None` if it is unauthored.
    fn relationship_targets(&self, path: Path, name: Token) -> Option<Vec<Path>>;

    /// Resolves an attribute at `time`. `None` if unauthored.
    fn attribute(&self, path: Path, name: Token, time: TimeCode) -> Option<Value>;

    fn has_attribute(&self, path: Path, name: Token) -> bool;

    /// Authored sample times in increasing order.
    fn time_samples(&self, path: Path, name: Token) -> Vec<f64>;

    /// Primvar metadata, or `None` if the attribute is not a primvar.
    fn primvar_info(&self, path: Path, name: Token) -> Option<PrimvarInfo>;

    #[inline]
    fn is_valid(&self, path: Path) -> bool {
        self.prim_kind(path).is_some()
    }

    /// First target of a relationship. Extra targets are tolerated with a
    /// warning.
    fn first_target(&self, path: Path, name: Token) -> Option<Path> {
        let targets = self.relationship_targets(path, name)?;
        if targets.len() > 1 {
            log::warn!(
                "<{path}>.{name} has multiple targets; only the first is used."
            );
        }
        targets.into_iter().next()
    }
}

/// Resolves a primvar, expanding indexed values into a flat array.
///
/// Returns `None` if the primvar is unauthored or its indices reference
/// values that do not exist.
pub fn compute_flattened_primvar(
    scene: &dyn SceneGraph,
    path: Path,
    name: Token,
    time: TimeCode,
) -> Option<Value> {
    let value = scene.attribute(path, name, time)?;
    let info = scene.primvar_info(path, name)?;
    if !info.indexed {
        return Some(value);
    }

    let indices_name = Token::new(&format!("{name}:indices"));
    let indices = scene
        .attribute(path, indices_name, time)
        .and_then(Value::into_int_array)?;
    let element_size = info.element_size.max(1);

    match value {
        Value::IntArray(v) => flatten(&v, &indices, element_size, path, name).map(Value::IntArray),
        Value::FloatArray(v) => {
            flatten(&v, &indices, element_size, path, name).map(Value::FloatArray)
        }
        Value::Vec3fArray(v) => {
            flatten(&v, &indices, element_size, path, name).map(Value::Vec3fArray)
        }
        Value::Matrix4dArray(v) => {
            flatten(&v, &indices, element_size, path, name).map(Value::Matrix4dArray)
        }
        other => Some(other),
    }
}

fn flatten<T: Clone>(
    values: &[T],
    indices: &[i32],
    element_size: usize,
    path: Path,
    name: Token,
) -> Option<Vec<T>> {
    let num_elements = values.len() / element_size;
    let mut out = Vec::with_capacity(indices.len() * element_size);
    for (i, &index) in indices.iter().enumerate() {
        let Ok(index) = usize::try_from(index) else {
            log::warn!("<{path}>.{name}: invalid index {index} at position {i}");
            return None;
        };
        if index >= num_elements {
            log::warn!(
                "<{path}>.{name}: index {index} at position {i} is out of range \
                 (num elements = {num_elements})"
            );
            return None;
        }
        out.extend_from_slice(&values[index * element_size..(index + 1) * element_size]);
    }
    Some(out)
}
