//! Relative paths from a sync root.
//!
//! A relative path is a slash-joined sequence of names. The root itself is
//! spelled `"."`. Paths are compared as plain strings: no case folding and
//! no normalization.

use serde::{Deserialize, Serialize};
use std::fmt;

const ROOT: &str = ".";

/// Slash-joined path from the sync root to an entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelPath(String);

impl RelPath {
    /// The sync root.
    pub fn root() -> Self {
        Self(ROOT.to_string())
    }

    /// Returns true if this is the sync root.
    pub fn is_root(&self) -> bool {
        self.0 == ROOT
    }

    /// Returns true if `name` can be used as a single path component.
    pub fn is_valid_component(name: &str) -> bool {
        !name.is_empty() && name != "." && name != ".." && !name.contains('/')
    }

    /// Appends one component.
    pub fn join(&self, name: &str) -> crate::Result<Self> {
        if !Self::is_valid_component(name) {
            return Err(crate::Error::InvalidComponent {
                path: self.0.clone(),
                component: name.to_string(),
            });
        }
        if self.is_root() {
            Ok(Self(name.to_string()))
        } else {
            Ok(Self(format!("{}/{}", self.0, name)))
        }
    }

    /// Builds a path from its components, root first.
    pub fn from_components<I, S>(components: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        components
            .into_iter()
            .try_fold(Self::root(), |path, name| path.join(name.as_ref()))
    }

    /// Parses a slash-joined path. `"."` and `""` are the root.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() || s == ROOT {
            return Ok(Self::root());
        }
        Self::from_components(s.split('/'))
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// The last component, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        })
    }

    /// Number of components; the root has depth 0.
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches('/').count() + 1
        }
    }

    /// Iterates over the components, root first.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        let inner = if self.is_root() { "" } else { self.0.as_str() };
        inner.split('/').filter(|c| !c.is_empty())
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RelPath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RelPath {
    type Error = crate::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<RelPath> for String {
    fn from(path: RelPath) -> Self {
        path.0
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
