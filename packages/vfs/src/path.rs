//! Absolute, normalized namespace paths.

use std::fmt;

/// Errors related to path parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The path string was empty.
    #[error("path is empty")]
    Empty,

    /// The path did not start with `/`.
    #[error("path '{path}' is not absolute")]
    NotAbsolute { path: String },

    /// The path tried to climb out of its parent with `..`.
    #[error("path '{path}' contains a '..' component")]
    Traversal { path: String },

    /// A single component is unusable.
    #[error("invalid path component '{component}' at position {position}: {message}")]
    InvalidComponent {
        component: String,
        position: usize,
        message: String,
    },
}

/// A validated absolute path in the namespace.
///
/// The root `/` has no components. Empty components and `.` are dropped
/// during parsing, so `/a//b/./c/` and `/a/b/c` are the same path.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct VfsPath {
    pub components: Vec<String>,
}

impl VfsPath {
    /// The root path `/`.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse an absolute path string.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gitsalt_vfs::VfsPath;
    ///
    /// let path = VfsPath::parse("/grvfs/repo/README").unwrap();
    /// assert_eq!(path.len(), 3);
    ///
    /// assert_eq!(VfsPath::parse("/a//b/").unwrap(), VfsPath::parse("/a/b").unwrap());
    /// assert!(VfsPath::parse("relative").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        if !s.starts_with('/') {
            return Err(PathError::NotAbsolute {
                path: s.to_string(),
            });
        }

        let mut components = Vec::new();
        for component in s.split('/') {
            match component {
                "" | "." => continue,
                ".." => {
                    return Err(PathError::Traversal {
                        path: s.to_string(),
                    })
                }
                other => {
                    Self::validate_component(other, components.len())?;
                    components.push(other.to_string());
                }
            }
        }

        Ok(VfsPath { components })
    }

    /// Build a path from already-split components, validating each one.
    pub fn try_from_components<I, S>(components: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Vec::new();
        for component in components {
            let component = component.into();
            if component == "." || component == ".." || component.is_empty() {
                return Err(PathError::InvalidComponent {
                    component,
                    position: out.len(),
                    message: "reserved name".to_string(),
                });
            }
            Self::validate_component(&component, out.len())?;
            out.push(component);
        }
        Ok(VfsPath { components: out })
    }

    fn validate_component(component: &str, position: usize) -> Result<(), PathError> {
        if component.contains('\0') {
            return Err(PathError::InvalidComponent {
                component: component.escape_default().to_string(),
                position,
                message: "contains a NUL byte".to_string(),
            });
        }
        Ok(())
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.components.iter()
    }

    /// Last component, `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// Parent directory, `None` for the root.
    pub fn parent(&self) -> Option<VfsPath> {
        if self.is_root() {
            return None;
        }
        Some(VfsPath {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    #[must_use]
    pub fn join(&self, other: &VfsPath) -> VfsPath {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        VfsPath { components }
    }

    /// Append one validated component.
    pub fn child(&self, name: &str) -> Result<VfsPath, PathError> {
        let mut path = self.clone();
        path.components
            .extend(VfsPath::try_from_components([name])?.components);
        Ok(path)
    }

    pub fn has_prefix(&self, prefix: &VfsPath) -> bool {
        prefix.components.len() <= self.components.len()
            && prefix.components == self.components[..prefix.components.len()]
    }

    /// Strip a prefix from this path, `None` if the prefix doesn't match.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &VfsPath) -> Option<VfsPath> {
        if self.has_prefix(prefix) {
            Some(VfsPath {
                components: self.components[prefix.components.len()..].to_vec(),
            })
        } else {
            None
        }
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.components.join("/"))
    }
}

impl std::str::FromStr for VfsPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VfsPath::parse(s)
    }
}

/// Build a [`VfsPath`] from a literal.
///
/// ```rust
/// use gitsalt_vfs::vpath;
///
/// assert_eq!(vpath!("/http/index.html").len(), 2);
/// ```
#[macro_export]
macro_rules! vpath {
    ($s:expr) => {
        $crate::VfsPath::parse($s).expect("invalid path literal")
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_paths() {
        assert_eq!(VfsPath::parse("/").unwrap().len(), 0);
        assert_eq!(VfsPath::parse("/foo").unwrap().len(), 1);
        assert_eq!(VfsPath::parse("/foo/bar.git").unwrap().len(), 2);
    }

    #[test]
    fn normalize_slashes_and_dots() {
        assert_eq!(vpath!("/foo/bar/"), vpath!("/foo/bar"));
        assert_eq!(vpath!("//foo///bar"), vpath!("/foo/bar"));
        assert_eq!(vpath!("/foo/./bar"), vpath!("/foo/bar"));
    }

    #[test]
    fn rejects_empty_relative_and_traversal() {
        assert_eq!(VfsPath::parse(""), Err(PathError::Empty));
        assert!(matches!(
            VfsPath::parse("foo/bar"),
            Err(PathError::NotAbsolute { .. })
        ));
        assert!(matches!(
            VfsPath::parse("/foo/../etc"),
            Err(PathError::Traversal { .. })
        ));
        assert!(matches!(
            VfsPath::parse("/foo/b\0r"),
            Err(PathError::InvalidComponent { position: 1, .. })
        ));
    }

    #[test]
    fn names_with_dots_and_dashes_are_fine() {
        let p = vpath!("/repo/.git/refs/heads/main-branch");
        assert_eq!(p.file_name(), Some("main-branch"));
        assert_eq!(&p.components[1], ".git");
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(vpath!("/").to_string(), "/");
        assert_eq!(vpath!("/a/b").to_string(), "/a/b");
        assert_eq!(VfsPath::parse(&vpath!("/x/y").to_string()).unwrap(), vpath!("/x/y"));
    }

    #[test]
    fn prefix_operations() {
        let p = vpath!("/grvfs/repo/src");
        assert!(p.has_prefix(&VfsPath::root()));
        assert!(p.has_prefix(&vpath!("/grvfs")));
        assert!(!p.has_prefix(&vpath!("/grv")));
        assert_eq!(p.strip_prefix(&vpath!("/grvfs")), Some(vpath!("/repo/src")));
        assert_eq!(p.strip_prefix(&vpath!("/http")), None);
    }

    #[test]
    fn parent_and_child() {
        let p = vpath!("/a/b");
        assert_eq!(p.parent(), Some(vpath!("/a")));
        assert_eq!(VfsPath::root().parent(), None);
        assert_eq!(p.child("c").unwrap(), vpath!("/a/b/c"));
        assert!(p.child("..").is_err());
        assert!(p.child("").is_err());
    }

    #[test]
    fn join_with_root() {
        assert_eq!(vpath!("/a").join(&VfsPath::root()), vpath!("/a"));
        assert_eq!(VfsPath::root().join(&vpath!("/b")), vpath!("/b"));
    }

    #[test]
    fn ordering_keeps_subtrees_contiguous() {
        let mut paths = vec![vpath!("/a0"), vpath!("/a/z"), vpath!("/a"), vpath!("/a/b")];
        paths.sort();
        assert_eq!(
            paths,
            vec![vpath!("/a"), vpath!("/a/b"), vpath!("/a/z"), vpath!("/a0")]
        );
    }
}
