//! 全局字符串驻留器 (String Interner)
//!
//! Scene locations and attribute/joint names are interned once and compared,
//! hashed and copied as compact integer symbols afterwards. Cache keys built
//! from paths therefore hash in O(1) regardless of path depth.

use std::sync::LazyLock;

use lasso::{Spur, ThreadedRodeo};

/// 全局字符串驻留器实例
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// Symbol 类型别名
///
/// A compact integer identifier; equality and hashing never touch the string.
pub type Symbol = Spur;

/// Interns a string, returning the existing symbol if it was seen before.
#[inline]
pub fn intern(s: &str) -> Symbol {
    INTERNER.get_or_intern(s)
}

/// Looks up the symbol of an already interned string without allocating.
#[inline]
pub fn get(s: &str) -> Option<Symbol> {
    INTERNER.get(s)
}

/// Resolves a symbol back to its string.
#[inline]
pub fn resolve(sym: Symbol) -> &'static str {
    INTERNER.resolve(&sym)
}

/// Pre-interns the attribute and relationship names read during cache
/// population so the traversal hot path only performs lookups.
pub fn preload_binding_names() {
    for name in crate::scene::tokens::ALL {
        intern(name);
    }
}
