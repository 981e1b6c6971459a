//! Interned scene locations and names.
//!
//! [`Path`] identifies a prim (`/Root/Skel`) or a joint (`hips/spine`) and
//! [`Token`] names an attribute, relationship or joint. Both are `Copy` and
//! hash as a single integer.

use std::fmt;

use crate::utils::interner::{self, Symbol};

/// An interned name.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(Symbol);

impl Token {
    #[must_use]
    pub fn new(s: &str) -> Self {
        Self(interner::intern(s))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        interner::resolve(self.0)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?})", self.as_str())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts a list of names into tokens.
#[must_use]
pub fn tokens(names: &[&str]) -> Vec<Token> {
    names.iter().map(|n| Token::new(n)).collect()
}

/// An interned, normalized scene location.
///
/// Absolute paths start with `/`; the absolute root is `/`. Relative paths
/// (as used for joint names) have no leading separator. Trailing separators
/// are stripped on construction.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Path(Symbol);

impl Path {
    pub const SEPARATOR: char = '/';

    #[must_use]
    pub fn new(s: &str) -> Self {
        let trimmed = s.trim_end_matches(Self::SEPARATOR);
        if trimmed.is_empty() && s.starts_with(Self::SEPARATOR) {
            Self::absolute_root()
        } else {
            Self(interner::intern(trimmed))
        }
    }

    #[must_use]
    pub fn absolute_root() -> Self {
        Self(interner::intern("/"))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        interner::resolve(self.0)
    }

    #[inline]
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.as_str().starts_with(Self::SEPARATOR)
    }

    #[inline]
    #[must_use]
    pub fn is_absolute_root(&self) -> bool {
        self.as_str() == "/"
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }

    /// The last path element (`"Skel"` for `/Root/Skel`).
    #[must_use]
    pub fn name(&self) -> &'static str {
        let s = self.as_str();
        match s.rfind(Self::SEPARATOR) {
            Some(i) => &s[i + 1..],
            None => s,
        }
    }

    /// The parent location, or `None` for the absolute root and for
    /// single-element relative paths.
    #[must_use]
    pub fn parent(&self) -> Option<Path> {
        let s = self.as_str();
        if s == "/" || s.is_empty() {
            return None;
        }
        match s.rfind(Self::SEPARATOR) {
            Some(0) => Some(Self::absolute_root()),
            Some(i) => Some(Self(interner::intern(&s[..i]))),
            None => None,
        }
    }

    /// Iterates the strict ancestors of this path, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = Path> {
        std::iter::successors(self.parent(), Path::parent)
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Token> for Path {
    fn from(t: Token) -> Self {
        Self::new(t.as_str())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.as_str())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_parent_chain() {
        let p = Path::new("/Root/Geom/Body");
        assert_eq!(p.name(), "Body");
        let chain: Vec<_> = p.ancestors().map(|a| a.as_str()).collect();
        assert_eq!(chain, vec!["/Root/Geom", "/Root", "/"]);
    }

    #[test]
    fn relative_parent_chain_stops_at_first_element() {
        let p = Path::new("hips/spine/neck");
        let chain: Vec<_> = p.ancestors().map(|a| a.as_str()).collect();
        assert_eq!(chain, vec!["hips/spine", "hips"]);
        assert!(!p.is_absolute());
    }

    #[test]
    fn trailing_separator_normalized() {
        assert_eq!(Path::new("/A/B/"), Path::new("/A/B"));
        assert_eq!(Path::new("/"), Path::absolute_root());
    }
}
