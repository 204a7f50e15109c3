use std::path::{Component, Path, PathBuf};

use soft_canonicalize::soft_canonicalize;

use crate::error::{Error, Result};

/// An archive entry name resolved to a location inside the extraction root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainedPath {
    pub entry: String,
    pub resolved: PathBuf,
}

/// Canonicalize an extraction root. The root must already exist.
pub fn canonical_root(root: &Path) -> Result<PathBuf> {
    soft_canonicalize(root).map_err(Error::from)
}

/// Resolve `entry` against `root` and verify it stays inside.
///
/// `root` must be canonical (see [`canonical_root`]). The check is done twice:
/// lexically on the joined path, then on its canonical form so that symlinks
/// already present under the root cannot redirect the entry elsewhere.
/// Containment is component-wise, so `/out-evil` is not inside `/out`.
pub fn resolve_contained(entry: &str, root: &Path) -> Result<ContainedPath> {
    if entry.is_empty() || entry.contains('\0') {
        return Err(Error::InvalidPath {
            entry: entry.to_owned(),
        });
    }

    let relative = entry.replace('\\', "/");
    let joined = root.join(&relative);

    let lexical = normalize_path(&joined);
    if !lexical.starts_with(root) {
        return Err(Error::PathTraversal {
            entry: entry.to_owned(),
            resolved: lexical,
        });
    }

    let resolved = soft_canonicalize(&joined)?;
    if !resolved.starts_with(root) {
        return Err(Error::PathTraversal {
            entry: entry.to_owned(),
            resolved,
        });
    }

    Ok(ContainedPath {
        entry: entry.to_owned(),
        resolved,
    })
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::Normal(part) => result.push(part),
            Component::RootDir => result.push(component.as_os_str()),
            Component::Prefix(prefix) => result.push(prefix.as_os_str()),
            Component::CurDir => {}
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = canonical_root(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn nested_entry_is_contained() {
        let (_dir, root) = root();
        let result = resolve_contained("bin/tool", &root).unwrap();
        assert_eq!(result.entry, "bin/tool");
        assert_eq!(result.resolved, root.join("bin").join("tool"));
    }

    #[test]
    fn inner_parent_components_are_allowed() {
        let (_dir, root) = root();
        let result = resolve_contained("a/b/../c.txt", &root).unwrap();
        assert_eq!(result.resolved, root.join("a").join("c.txt"));
    }

    #[test]
    fn parent_traversal_rejected() {
        let (_dir, root) = root();
        let result = resolve_contained("../../etc/passwd", &root);
        assert!(matches!(result, Err(Error::PathTraversal { .. })));
    }

    #[test]
    fn backslash_traversal_rejected() {
        let (_dir, root) = root();
        let result = resolve_contained("..\\..\\evil.sh", &root);
        assert!(matches!(result, Err(Error::PathTraversal { .. })));
    }

    #[test]
    fn absolute_entry_rejected() {
        let (_dir, root) = root();
        let malicious = if cfg!(windows) { "C:\\etc\\passwd" } else { "/etc/passwd" };
        let result = resolve_contained(malicious, &root);
        assert!(matches!(result, Err(Error::PathTraversal { .. })));
    }

    #[test]
    fn sibling_with_shared_prefix_rejected() {
        let (_dir, root) = root();
        let name = root.file_name().unwrap().to_string_lossy().into_owned();
        let entry = format!("../{name}-evil/file.txt");
        let result = resolve_contained(&entry, &root);
        assert!(matches!(result, Err(Error::PathTraversal { .. })));
    }

    #[test]
    fn null_byte_rejected() {
        let (_dir, root) = root();
        let result = resolve_contained("bad\0name", &root);
        assert!(matches!(result, Err(Error::InvalidPath { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_rejected() {
        let (_dir, root) = root();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.join("link")).unwrap();

        let result = resolve_contained("link/payload.txt", &root);
        assert!(matches!(result, Err(Error::PathTraversal { .. })));
    }

    #[test]
    fn path_normalization() {
        let result = normalize_path(Path::new("foo//bar/./baz/../qux"));
        assert_eq!(result, Path::new("foo/bar/qux"));
    }
}
