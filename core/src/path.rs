//! Lexical path confinement.
//!
//! Every file operation and every command working directory is resolved through a
//! [`PathConfiner`]. Resolution is purely lexical: the caller's path is joined onto the
//! [`BaseDirectory`], `.` and `..` segments are collapsed without touching the filesystem,
//! and the result is accepted only if it still lies under the base.
//!
//! # Known limitation
//!
//! Symlinks are not resolved. A symlink *inside* the base directory that points outside
//! of it passes the check, and operations through it reach the link target.

use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// The single root every operation is confined to.
///
/// Always absolute and lexically normalized. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseDirectory(Arc<Path>);

impl BaseDirectory {
    /// Creates a base directory from `path`.
    ///
    /// Relative paths are made absolute against the current working directory. The
    /// directory does not have to exist.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is empty or the current directory cannot be determined.
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let absolute = std::path::absolute(path.as_ref())?;
        Ok(Self(normalize(&absolute).into()))
    }

    /// Returns the base directory as a path.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for BaseDirectory {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for BaseDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display().fmt(f)
    }
}

/// A path that is lexically contained in a [`BaseDirectory`].
///
/// Only [`PathConfiner::confine`] constructs these.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfinedPath(PathBuf);

impl ConfinedPath {
    /// Returns the resolved absolute path.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consumes the confined path, returning the inner [`PathBuf`].
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ConfinedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ConfinedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display().fmt(f)
    }
}

/// A requested path resolves outside the base directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{requested}' resolves to '{}', outside of base directory '{}'", .resolved.display(), .base.display())]
pub struct ConfinementError {
    /// The path as supplied by the caller.
    pub requested: String,
    /// Where the path normalized to.
    pub resolved: PathBuf,
    /// The base directory it escaped.
    pub base: PathBuf,
}

/// Resolves caller-supplied relative paths against a [`BaseDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConfiner {
    base: BaseDirectory,
}

impl PathConfiner {
    /// Creates a confiner rooted at `base`.
    #[must_use]
    pub const fn new(base: BaseDirectory) -> Self {
        Self { base }
    }

    /// Returns the base directory.
    #[must_use]
    pub const fn base(&self) -> &BaseDirectory {
        &self.base
    }

    /// Resolves `relative` under the base directory.
    ///
    /// An empty path resolves to the base directory itself. An absolute path replaces
    /// the base when joined, so it is accepted only if it already lies inside it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfinementError`] if the normalized path is not inside the base.
    pub fn confine(&self, relative: impl AsRef<OsStr>) -> Result<ConfinedPath, ConfinementError> {
        let relative = Path::new(relative.as_ref());
        let resolved = normalize(&self.base.as_path().join(relative));

        // Component-wise: "/data2" does not start with "/data".
        if resolved.starts_with(self.base.as_path()) {
            Ok(ConfinedPath(resolved))
        } else {
            Err(ConfinementError {
                requested: relative.to_string_lossy().into_owned(),
                resolved,
                base: self.base.as_path().to_path_buf(),
            })
        }
    }
}

/// Collapses `.` and `..` segments without consulting the filesystem.
///
/// `..` at the root stays at the root.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() && !normalized.has_root() {
                    normalized.push("..");
                }
            }
            Component::Normal(segment) => normalized.push(segment),
        }
    }
    normalized
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn confiner() -> PathConfiner {
        PathConfiner::new(BaseDirectory::new("/data").unwrap())
    }

    #[test]
    fn empty_path_is_base() {
        let confined = confiner().confine("").unwrap();
        assert_eq!(confined.as_path(), Path::new("/data"));
    }

    #[test]
    fn nested_paths_resolve_inside() {
        let confiner = confiner();
        assert_eq!(
            confiner.confine("a/b/c.txt").unwrap().as_path(),
            Path::new("/data/a/b/c.txt")
        );
        assert_eq!(
            confiner.confine("./a/./b/../c").unwrap().as_path(),
            Path::new("/data/a/c")
        );
        assert_eq!(
            confiner.confine("a/..").unwrap().as_path(),
            Path::new("/data")
        );
        assert_eq!(confiner.confine(".").unwrap().as_path(), Path::new("/data"));
    }

    #[test]
    fn parent_traversal_is_rejected() {
        let confiner = confiner();
        for path in ["..", "../etc/passwd", "a/../../etc", "a/b/../../../x", "../../../../"] {
            let err = confiner.confine(path).unwrap_err();
            assert_eq!(err.requested, path);
            assert!(!err.resolved.starts_with("/data"), "{path}");
        }
    }

    #[test]
    fn sibling_with_shared_prefix_is_rejected() {
        let err = confiner().confine("../data2/secret").unwrap_err();
        assert_eq!(err.resolved, Path::new("/data2/secret"));
    }

    #[test]
    fn traversal_that_returns_inside_is_accepted() {
        assert_eq!(
            confiner().confine("../data/inner").unwrap().as_path(),
            Path::new("/data/inner")
        );
    }

    #[test]
    fn absolute_paths_must_lie_inside() {
        let confiner = confiner();
        assert!(confiner.confine("/etc/passwd").is_err());
        assert_eq!(
            confiner.confine("/data/x").unwrap().as_path(),
            Path::new("/data/x")
        );
    }

    #[test]
    fn base_directory_is_normalized() {
        let base = BaseDirectory::new("/srv/./files/../data/").unwrap();
        assert_eq!(base.as_path(), Path::new("/srv/data"));

        let relative = BaseDirectory::new("workspace").unwrap();
        assert!(relative.as_path().is_absolute());
        assert!(relative.as_path().ends_with("workspace"));
    }

    #[test]
    fn normalize_keeps_root() {
        assert_eq!(normalize(Path::new("/../..")), Path::new("/"));
        assert_eq!(normalize(Path::new("/a/./b//c/..")), Path::new("/a/b"));
    }

    #[test]
    fn error_message_names_both_paths() {
        let message = confiner().confine("../etc").unwrap_err().to_string();
        assert!(message.contains("/etc"));
        assert!(message.contains("/data"));
    }
}
