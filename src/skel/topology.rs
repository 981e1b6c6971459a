//! Joint hierarchy as a parent-index array.

use rustc_hash::FxHashMap;

use crate::errors::{Result, SkelError};
use crate::scene::{Path, Token};

/// An immutable forest of joints.
///
/// Joint `i` has parent index `parent(i)` in `[-1, i)`, `-1` marking a root.
/// Because every parent precedes its children, transforms can be composed in
/// a single forward pass. The ordering is checked on construction, so a
/// `Topology` value is always valid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct Topology {
    parents: Vec<i32>,
}

impl Topology {
    /// Builds a topology from raw parent indices.
    pub fn from_parent_indices(parents: Vec<i32>) -> Result<Self> {
        Self::validate_parents(&parents)?;
        Ok(Self { parents })
    }

    /// Builds a topology from joint paths (`hips`, `hips/spine`, ...).
    ///
    /// Each joint's parent is its nearest ancestor path present in the set,
    /// so sparse joint sets are allowed.
    pub fn from_joint_paths(paths: &[Path]) -> Result<Self> {
        let lookup: FxHashMap<Path, usize> = paths
            .iter()
            .enumerate()
            .map(|(i, p)| (*p, i))
            .collect();

        let parents = paths
            .iter()
            .map(|path| {
                path.ancestors()
                    .find_map(|a| lookup.get(&a))
                    .map_or(-1, |&i| i32::try_from(i).unwrap_or(-1))
            })
            .collect();
        Self::from_parent_indices(parents)
    }

    /// Builds a topology from joint names as authored on a skeleton.
    pub fn from_joint_tokens(joints: &[Token]) -> Result<Self> {
        let paths: Vec<Path> = joints.iter().map(|&t| Path::from(t)).collect();
        Self::from_joint_paths(&paths)
    }

    /// Checks that every parent index is `-1` or strictly less than its
    /// joint's index.
    pub fn validate_parents(parents: &[i32]) -> Result<()> {
        for (i, &parent) in parents.iter().enumerate() {
            check_parent(i, parent)?;
        }
        Ok(())
    }

    /// Re-checks the ordering invariant.
    pub fn validate(&self) -> Result<()> {
        Self::validate_parents(&self.parents)
    }

    /// Parent index of joint `i`, `-1` for roots.
    #[inline]
    #[must_use]
    pub fn parent(&self, i: usize) -> i32 {
        self.parents[i]
    }

    #[inline]
    #[must_use]
    pub fn is_root(&self, i: usize) -> bool {
        self.parents[i] < 0
    }

    #[inline]
    #[must_use]
    pub fn parent_indices(&self) -> &[i32] {
        &self.parents
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Returns the parent of joint `i` as an index, or `None` for roots.
/// Fails if the parent does not precede the joint.
#[inline]
pub(crate) fn check_parent(i: usize, parent: i32) -> Result<Option<usize>> {
    let Ok(p) = usize::try_from(parent) else {
        return Ok(None);
    };
    if p < i {
        Ok(Some(p))
    } else if p == i {
        Err(SkelError::SelfParented { joint: i }.warn())
    } else {
        Err(SkelError::MisorderedParent { joint: i, parent }.warn())
    }
}
