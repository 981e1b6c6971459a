//! Remapping of animation-ordered data onto a skeleton's joint order.

use glam::DMat4;
use rustc_hash::FxHashMap;

use crate::errors::{Result, SkelError};
use crate::scene::Token;

const SOME_SOURCE_VALUES_MAP_TO_TARGET: u8 = 0x1;
const ALL_SOURCE_VALUES_MAP_TO_TARGET: u8 = 0x2;
const SOURCE_OVERRIDES_ALL_TARGET_VALUES: u8 = 0x4;
const ORDERED_MAP: u8 = 0x8;

const IDENTITY_MASK: u8 =
    ALL_SOURCE_VALUES_MAP_TO_TARGET | SOURCE_OVERRIDES_ALL_TARGET_VALUES | ORDERED_MAP;

/// Maps values from a source order (an animation's joints) to a target
/// order (a skeleton's joints).
///
/// When the source appears as a contiguous run inside the target, values are
/// block-copied at an offset; otherwise each source element carries the index
/// of its target slot (or none).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimMapper {
    target_size: usize,
    offset: usize,
    index_map: Vec<Option<usize>>,
    flags: u8,
}

impl AnimMapper {
    /// A mapper that passes `size` elements through unchanged.
    #[must_use]
    pub fn identity(size: usize) -> Self {
        Self {
            target_size: size,
            offset: 0,
            index_map: Vec::new(),
            flags: IDENTITY_MASK,
        }
    }

    /// Builds the mapping from `source` to `target` order. A mapper with an
    /// empty side is null.
    #[must_use]
    pub fn new(source: &[Token], target: &[Token]) -> Self {
        let mut mapper = Self {
            target_size: target.len(),
            ..Self::default()
        };
        if source.is_empty() || target.is_empty() {
            return mapper;
        }

        // Ordered: the source is a contiguous run of the target.
        if let Some(offset) = target.iter().position(|t| *t == source[0])
            && offset + source.len() <= target.len()
            && target[offset..offset + source.len()] == *source
        {
            mapper.offset = offset;
            mapper.flags = ORDERED_MAP | ALL_SOURCE_VALUES_MAP_TO_TARGET;
            if offset == 0 && source.len() == target.len() {
                mapper.flags |= SOURCE_OVERRIDES_ALL_TARGET_VALUES;
            }
            return mapper;
        }

        let target_lookup: FxHashMap<Token, usize> = target
            .iter()
            .enumerate()
            .map(|(i, t)| (*t, i))
            .collect();

        let mut target_mapped = vec![false; target.len()];
        let mut mapped_count = 0;
        mapper.index_map = source
            .iter()
            .map(|s| {
                let index = target_lookup.get(s).copied();
                if let Some(i) = index {
                    target_mapped[i] = true;
                    mapped_count += 1;
                }
                index
            })
            .collect();

        if mapped_count == source.len() {
            mapper.flags |= ALL_SOURCE_VALUES_MAP_TO_TARGET;
        } else if mapped_count > 0 {
            mapper.flags |= SOME_SOURCE_VALUES_MAP_TO_TARGET;
        }
        if target_mapped.iter().all(|&m| m) {
            mapper.flags |= SOURCE_OVERRIDES_ALL_TARGET_VALUES;
        }
        mapper
    }

    /// Source and target orders are the same.
    #[inline]
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.flags & IDENTITY_MASK == IDENTITY_MASK
    }

    /// Some target elements receive no source value, so remapped output
    /// must be seeded with fallback values first.
    #[inline]
    #[must_use]
    pub fn is_sparse(&self) -> bool {
        self.flags & SOURCE_OVERRIDES_ALL_TARGET_VALUES == 0
    }

    /// No source element maps to the target.
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.flags & (ALL_SOURCE_VALUES_MAP_TO_TARGET | SOME_SOURCE_VALUES_MAP_TO_TARGET) == 0
    }

    #[inline]
    #[must_use]
    pub fn target_len(&self) -> usize {
        self.target_size
    }

    #[inline]
    fn is_ordered(&self) -> bool {
        self.flags & ORDERED_MAP != 0
    }

    /// Copies `source` (in source order, `element_size` values per element)
    /// into `target` (in target order).
    ///
    /// `target` is resized to `target_len() * element_size`. Slots added by
    /// the resize are filled with `default` when given; slots already
    /// present keep their value unless overwritten by a mapped element.
    pub fn remap<T: Clone + Default>(
        &self,
        source: &[T],
        target: &mut Vec<T>,
        element_size: usize,
        default: Option<&T>,
    ) -> Result<()> {
        if element_size == 0 {
            return Err(SkelError::InvalidElementSize(element_size).coding_error());
        }
        if self.is_null() {
            return Ok(());
        }

        let target_array_size = self.target_size * element_size;
        if self.is_identity() && source.len() == target_array_size {
            target.clear();
            target.extend_from_slice(source);
            return Ok(());
        }

        let prev_len = target.len();
        target.resize(target_array_size, T::default());
        if let Some(default) = default
            && target_array_size > prev_len
        {
            target[prev_len..].fill(default.clone());
        }

        if self.is_ordered() {
            let start = self.offset * element_size;
            let count = source.len().min(target_array_size.saturating_sub(start));
            target[start..start + count].clone_from_slice(&source[..count]);
        } else {
            let count = (source.len() / element_size).min(self.index_map.len());
            for (i, index) in self.index_map[..count].iter().enumerate() {
                let Some(t) = *index else { continue };
                let dst = t * element_size;
                let src = i * element_size;
                target[dst..dst + element_size].clone_from_slice(&source[src..src + element_size]);
            }
        }
        Ok(())
    }

    /// [`remap`](Self::remap) for transforms, filling new slots with
    /// identity.
    pub fn remap_transforms(&self, source: &[DMat4], target: &mut Vec<DMat4>, element_size: usize) -> Result<()> {
        self.remap(source, target, element_size, Some(&DMat4::IDENTITY))
    }
}
