//! Recursive export of any hierarchical resource into a [`VirtualFile`].

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::vfile::VirtualFile;

/// A node of a tree that can be exported: a named directory with children,
/// or a named file with byte content.
pub trait TreeSource: Sized {
    type Reader: Read;

    fn name(&self) -> &str;
    fn is_dir(&self) -> bool;
    /// Immediate children. Only called on directories.
    fn children(&self) -> io::Result<Vec<Self>>;
    /// Content reader. Only called on files.
    fn open(&self) -> io::Result<Self::Reader>;
}

/// Recreate `source` as a child of `dest`. Returns the number of files written.
pub fn export_tree<S: TreeSource>(source: &S, dest: &VirtualFile<'_>) -> Result<usize> {
    if source.is_dir() {
        let dir = dest.dir(source.name())?;
        let written = export_contents(source, &dir)?;
        dir.close()?;
        return Ok(written);
    }

    let mut reader = source.open()?;
    let mut sink = dest.byte_sink(source.name())?;
    let bytes = io::copy(&mut reader, &mut sink)?;
    sink.close()?;
    trace!(entry = %dest.relative_path(source.name()), bytes, "exported file");
    Ok(1)
}

/// Recreate the children of `source` directly under `dest`.
pub fn export_contents<S: TreeSource>(source: &S, dest: &VirtualFile<'_>) -> Result<usize> {
    let mut written = 0;
    for child in source.children()? {
        written += export_tree(&child, dest)?;
    }
    debug!(source = source.name(), destination = %dest.location(), written, "exported tree");
    Ok(written)
}

/// A real directory tree. Symlinks are followed; children are visited in
/// name order so exports are reproducible.
///
/// A directory that resolves to one of its own ancestors (a symlink loop) is
/// left out of [`TreeSource::children`] with a warning.
#[derive(Clone, Debug)]
pub struct FsTree {
    path: PathBuf,
    name: String,
    is_dir: bool,
    /// Canonical paths of this directory and its ancestors.
    branch: Vec<PathBuf>,
}

impl FsTree {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::with_branch(path.as_ref(), Vec::new())
    }

    fn with_branch(path: &Path, mut branch: Vec<PathBuf>) -> io::Result<Self> {
        let is_dir = fs::metadata(path)?.is_dir();
        if is_dir {
            branch.push(fs::canonicalize(path)?);
        } else {
            branch.clear();
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            name,
            is_dir,
            branch,
        })
    }

    fn loops_back(&self, path: &Path) -> io::Result<bool> {
        if !fs::metadata(path)?.is_dir() {
            return Ok(false);
        }
        Ok(self.branch.contains(&fs::canonicalize(path)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TreeSource for FsTree {
    type Reader = BufReader<File>;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }

    fn children(&self) -> io::Result<Vec<Self>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if self.loops_back(&path)? {
                warn!(path = %path.display(), "skipping directory that loops back to an ancestor");
                continue;
            }
            children.push(Self::with_branch(&path, self.branch.clone())?);
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    fn open(&self) -> io::Result<Self::Reader> {
        File::open(&self.path).map(BufReader::new)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use super::*;
    use crate::error::Error;

    /// Tree held entirely in memory, to exercise the exporter without disk.
    #[derive(Clone)]
    enum Node {
        File(&'static str, &'static [u8]),
        Dir(&'static str, Vec<Node>),
    }

    impl TreeSource for Node {
        type Reader = &'static [u8];

        fn name(&self) -> &str {
            match self {
                Node::File(n, _) | Node::Dir(n, _) => n,
            }
        }

        fn is_dir(&self) -> bool {
            matches!(self, Node::Dir(..))
        }

        fn children(&self) -> io::Result<Vec<Self>> {
            match self {
                Node::Dir(_, kids) => Ok(kids.clone()),
                Node::File(..) => Ok(Vec::new()),
            }
        }

        fn open(&self) -> io::Result<Self::Reader> {
            match self {
                Node::File(_, content) => Ok(*content),
                Node::Dir(..) => Err(io::Error::other("directory has no content")),
            }
        }
    }

    fn study() -> Node {
        Node::Dir(
            "study",
            vec![
                Node::File("readme.txt", b"about"),
                Node::Dir("datasets", vec![Node::File("dem.tsv", b"id\tage\n1\t40\n")]),
            ],
        )
    }

    #[test]
    fn exports_tree_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let vf = VirtualFile::disk(dir.path()).unwrap();

        assert_eq!(vf.save_tree(&study()).unwrap(), 2);
        assert_eq!(fs::read(dir.path().join("study/readme.txt")).unwrap(), b"about");
        assert_eq!(
            fs::read(dir.path().join("study/datasets/dem.tsv")).unwrap(),
            b"id\tage\n1\t40\n"
        );
    }

    #[test]
    fn exports_tree_to_archive() {
        let mut buffer = Vec::new();
        let vf = VirtualFile::archive_borrowed(&mut buffer);
        export_contents(&study(), &vf).unwrap();
        vf.close().unwrap();

        let archive = zip::ZipArchive::new(Cursor::new(buffer)).unwrap();
        let mut names: Vec<_> = archive.file_names().collect();
        names.sort();
        assert_eq!(names, ["datasets/dem.tsv", "readme.txt"]);
    }

    #[test]
    fn memory_cannot_take_binary_tree() {
        let vf = VirtualFile::memory();
        let result = vf.save_tree(&study());
        assert!(matches!(result, Err(Error::Unsupported { .. })));
    }

    #[test]
    fn fs_tree_children_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir(dir.path().join("c")).unwrap();

        let tree = FsTree::new(dir.path()).unwrap();
        assert!(tree.is_dir());
        let names: Vec<_> = tree.children().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["a.txt", "b.txt", "c"]);

        let mut content = String::new();
        FsTree::new(dir.path().join("a.txt"))
            .unwrap()
            .open()
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "a");
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_is_exported_once() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("src");
        fs::create_dir_all(source.join("inner")).unwrap();
        fs::write(source.join("inner").join("a.txt"), "a").unwrap();
        std::os::unix::fs::symlink(&source, source.join("inner").join("loop")).unwrap();

        let dest = VirtualFile::disk(temp.path().join("copy")).unwrap();
        let written = dest.save_tree(&FsTree::new(&source).unwrap()).unwrap();

        assert_eq!(written, 1);
        assert!(temp.path().join("copy/src/inner/a.txt").is_file());
        assert!(!temp.path().join("copy/src/inner/loop").exists());
    }
}
