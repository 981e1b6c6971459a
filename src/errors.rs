//! Error Types
//!
//! This module defines the error type used throughout the skeleton core.
//!
//! # Overview
//!
//! The main error type [`SkelError`] covers two classes of failure:
//! - **Data errors**: malformed topology, mismatched array sizes, out-of-range
//!   joint indices, singular transforms. These are reported as warnings at the
//!   point of detection and returned to the caller.
//! - **Coding errors**: using a query that reported itself invalid, or asking
//!   for an operation the query does not support. These are logged at error
//!   level and returned.
//!
//! Degraded-but-usable conditions (sparse animation mappings, a missing geom
//! bind transform, no time samples) are not errors; the affected operations
//! fall back to rest pose, identity, or default-time values instead.
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, SkelError>`.
//!
//! ```rust,ignore
//! use myth_skel::errors::{Result, SkelError};
//!
//! fn check(len: usize, expected: usize) -> Result<()> {
//!     SkelError::check_size("points", len, "expected", expected)
//! }
//! ```

use thiserror::Error;

/// The main error type for skeleton evaluation and skinning.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkelError {
    // ========================================================================
    // Shape Errors
    // ========================================================================
    /// Two coupled arrays have inconsistent sizes.
    #[error("Size of {what} [{actual}] != {expected_what} [{expected}]")]
    SizeMismatch {
        /// Description of the array that was checked
        what: &'static str,
        /// Its actual size
        actual: usize,
        /// Description of the reference quantity
        expected_what: &'static str,
        /// The expected size
        expected: usize,
    },

    /// An influence array is not a whole multiple of the influence count.
    #[error(
        "Unexpected array size [{size}]: Size must be a multiple of the number of \
         influences per component [{num_influences}]."
    )]
    InfluenceShape {
        /// The array size
        size: usize,
        /// Influences per component
        num_influences: usize,
    },

    /// The influence count per component is zero.
    #[error(
        "Invalid number of influences per component ({0}): number of influences \
         must be greater than zero."
    )]
    InvalidInfluenceCount(usize),

    /// A remap was requested with an element size of zero.
    #[error("Invalid elementSize [{0}]: elementSize must be greater than zero.")]
    InvalidElementSize(usize),

    // ========================================================================
    // Topology Errors
    // ========================================================================
    /// A joint names itself as its parent.
    #[error("Joint {joint} has itself as its parent.")]
    SelfParented {
        /// The offending joint
        joint: usize,
    },

    /// A joint's parent does not precede it in joint order.
    #[error(
        "Joint {joint} has mis-ordered parent {parent}. Joints are expected to be \
         ordered with parent joints always coming before children."
    )]
    MisorderedParent {
        /// The offending joint
        joint: usize,
        /// Its parent index
        parent: i32,
    },

    // ========================================================================
    // Index Errors
    // ========================================================================
    /// An influence references a joint that does not exist.
    #[error("Out of range joint index {index} at index {at} (num joints = {num_joints}).")]
    JointIndexOutOfRange {
        /// The joint index read from the influence
        index: i32,
        /// Position in the influence array
        at: usize,
        /// Number of joint transforms supplied
        num_joints: usize,
    },

    /// A blend shape offset references a point that does not exist.
    #[error("Out of range point index {index} (num points = {num_points}).")]
    PointIndexOutOfRange {
        /// The point index read from the blend shape
        index: i32,
        /// Number of points supplied
        num_points: usize,
    },

    // ========================================================================
    // Numeric Errors
    // ========================================================================
    /// A transform could not be factored into translate/rotate/scale.
    #[error("Failed decomposing transform {index}. The source transform may be singular.")]
    SingularTransform {
        /// Position of the transform in its batch
        index: usize,
    },

    // ========================================================================
    // Binding & Query Errors
    // ========================================================================
    /// The authored skinning method token is not recognized.
    #[error("Unknown skinning method: '{0}'")]
    UnknownSkinningMethod(String),

    /// A required attribute has no resolvable value.
    #[error("Could not resolve '{attribute}' on <{prim}>")]
    MissingValue {
        /// Location of the prim
        prim: String,
        /// Attribute name
        attribute: String,
    },

    /// A query was used without checking its validity first.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Transform skinning was requested for non-rigid influences.
    #[error("Attempted to skin a transform on <{0}>, which is not rigidly deformed.")]
    NotRigidlyDeformed(String),
}

impl SkelError {
    /// Logs a data error as a warning and hands it back for propagation.
    #[must_use]
    pub fn warn(self) -> Self {
        log::warn!("{self}");
        self
    }

    /// Logs a coding error loudly and hands it back for propagation.
    #[must_use]
    pub fn coding_error(self) -> Self {
        log::error!("Coding error: {self}");
        self
    }

    /// Checks that `actual == expected`, warning and failing otherwise.
    pub fn check_size(
        what: &'static str,
        actual: usize,
        expected_what: &'static str,
        expected: usize,
    ) -> Result<()> {
        if actual == expected {
            Ok(())
        } else {
            Err(SkelError::SizeMismatch {
                what,
                actual,
                expected_what,
                expected,
            }
            .warn())
        }
    }
}

/// Alias for `Result<T, SkelError>`.
pub type Result<T> = std::result::Result<T, SkelError>;
