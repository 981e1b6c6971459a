//! Utility Module
//!
//! - [`interner`]: String interning for scene locations and names
//! - [`parallel`]: Serial/parallel chunked loops shared by all kernels
//!
//! # String Interning
//!
//! Interned strings (Symbols) compare and hash in O(1) time, which keeps
//! path-keyed cache lookups cheap.
//!
//! ```rust,ignore
//! use myth_skel::utils::interner;
//!
//! let sym1 = interner::intern("/Root/Skel");
//! let sym2 = interner::intern("/Root/Skel");
//! assert_eq!(sym1, sym2); // O(1) comparison
//! ```

pub mod interner;
pub mod parallel;

pub use interner::Symbol;
pub use parallel::PARALLEL_GRAIN_SIZE;
