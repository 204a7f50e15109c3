//! The uniform handle exporters write through.
//!
//! [`VirtualFile`] is a tagged union of the three media. Operations a medium
//! cannot honor return [`crate::Error::Unsupported`] instead of pretending to
//! succeed, so "nothing there" and "cannot look" stay distinguishable.

use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::archive::{ArchiveDestination, ArchiveOptions, SinkOwnership};
use crate::disk::DiskDestination;
use crate::document;
use crate::error::Result;
use crate::memory::MemoryDestination;
use crate::sink::{ByteSink, InputStream, TextSink};
use crate::tree::{self, TreeSource};

pub enum VirtualFile<'a> {
    Disk(DiskDestination),
    Archive(ArchiveDestination<'a>),
    Memory(MemoryDestination),
}

impl From<DiskDestination> for VirtualFile<'_> {
    fn from(dest: DiskDestination) -> Self {
        Self::Disk(dest)
    }
}

impl<'a> From<ArchiveDestination<'a>> for VirtualFile<'a> {
    fn from(dest: ArchiveDestination<'a>) -> Self {
        Self::Archive(dest)
    }
}

impl From<MemoryDestination> for VirtualFile<'_> {
    fn from(dest: MemoryDestination) -> Self {
        Self::Memory(dest)
    }
}

impl<'a> VirtualFile<'a> {
    /// Directory at `path`, created if missing.
    pub fn disk(path: impl Into<PathBuf>) -> Result<Self> {
        DiskDestination::new(path).map(Self::Disk)
    }

    /// New zip file `dir/file_name`; the returned handle owns it.
    pub fn archive_file(dir: impl AsRef<Path>, file_name: &str) -> Result<Self> {
        Self::archive_file_with(dir, file_name, ArchiveOptions::default())
    }

    pub fn archive_file_with(
        dir: impl AsRef<Path>,
        file_name: &str,
        options: ArchiveOptions,
    ) -> Result<Self> {
        ArchiveDestination::create(dir, file_name, options).map(Self::Archive)
    }

    /// Streaming archive over any byte sink, e.g. an HTTP response body.
    pub fn archive_writer<W: Write + Send + 'a>(writer: W, ownership: SinkOwnership) -> Self {
        Self::Archive(ArchiveDestination::from_stream(
            writer,
            ownership,
            ArchiveOptions::default(),
        ))
    }

    /// Streaming archive over a sink the caller keeps using after close.
    pub fn archive_borrowed<W: Write + Send>(writer: &'a mut W) -> Self {
        Self::Archive(ArchiveDestination::from_borrowed(
            writer,
            ArchiveOptions::default(),
        ))
    }

    pub fn memory() -> Self {
        Self::Memory(MemoryDestination::new())
    }

    /// Human-readable description of where this handle writes. Diagnostic
    /// only; it is not guaranteed to be a usable path.
    pub fn location(&self) -> String {
        match self {
            Self::Disk(d) => d.location(),
            Self::Archive(a) => a.location(),
            Self::Memory(m) => m.location(),
        }
    }

    pub fn make_legal_name<'n>(&self, name: &'n str) -> Cow<'n, str> {
        match self {
            Self::Disk(d) => d.make_legal_name(name),
            Self::Archive(a) => a.make_legal_name(name),
            Self::Memory(m) => m.make_legal_name(name),
        }
    }

    /// Path of `name` relative to the root of this handle's tree.
    pub fn relative_path(&self, name: &str) -> String {
        match self {
            Self::Disk(d) => d.relative_path(name),
            Self::Archive(a) => a.relative_path(name),
            Self::Memory(m) => m.relative_path(name),
        }
    }

    pub fn byte_sink(&self, name: &str) -> Result<ByteSink<'a>> {
        match self {
            Self::Disk(d) => d.byte_sink(name),
            Self::Archive(a) => a.byte_sink(name),
            Self::Memory(_) => Err(MemoryDestination::unsupported("binary output")),
        }
    }

    pub fn text_sink(&self, name: &str) -> Result<TextSink<'a>> {
        match self {
            Self::Disk(d) => d.text_sink(name),
            Self::Archive(a) => a.text_sink(name),
            Self::Memory(m) => m.text_sink(name),
        }
    }

    /// `Ok(None)` when `name` does not exist.
    pub fn input_stream(&self, name: &str) -> Result<Option<InputStream>> {
        match self {
            Self::Disk(d) => d.input_stream(name),
            Self::Archive(_) => Err(ArchiveDestination::unsupported("reading")),
            Self::Memory(m) => m.input_stream(name),
        }
    }

    pub fn write_document<T: Serialize + ?Sized>(&self, name: &str, doc: &T) -> Result<()> {
        match self {
            Self::Disk(d) => d.write_document(name, doc),
            Self::Archive(a) => {
                let mut sink = a.text_sink(name)?;
                document::serialize(doc, &mut sink)?;
                sink.close()
            }
            Self::Memory(m) => m.write_document(name, doc),
        }
    }

    pub fn read_document<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self {
            Self::Disk(d) => d.read_document(name),
            Self::Archive(_) => Err(ArchiveDestination::unsupported("reading documents")),
            Self::Memory(m) => m.read_document(name),
        }
    }

    /// Names of the immediate files under this handle, sorted.
    pub fn list_files(&self) -> Result<Vec<String>> {
        match self {
            Self::Disk(d) => d.list_files(),
            Self::Archive(_) => Err(ArchiveDestination::unsupported("listing files")),
            Self::Memory(m) => m.list_files(),
        }
    }

    /// Names of the immediate sub-directories under this handle, sorted.
    pub fn list_dirs(&self) -> Result<Vec<String>> {
        match self {
            Self::Disk(d) => d.list_dirs(),
            Self::Archive(_) => Err(ArchiveDestination::unsupported("listing directories")),
            Self::Memory(m) => m.list_dirs(),
        }
    }

    /// `Ok(false)` when there was nothing to delete.
    pub fn delete(&self, name: &str) -> Result<bool> {
        match self {
            Self::Disk(d) => d.delete(name),
            Self::Archive(_) => Err(ArchiveDestination::unsupported("deleting")),
            Self::Memory(m) => m.delete(name),
        }
    }

    pub fn dir(&self, name: &str) -> Result<Self> {
        match self {
            Self::Disk(d) => d.dir(name).map(Self::Disk),
            Self::Archive(a) => Ok(Self::Archive(a.dir(name))),
            Self::Memory(m) => m.dir(name).map(Self::Memory),
        }
    }

    /// Nested archive named `name`: a zip file on disk, or a zip entry
    /// inside the current archive.
    pub fn create_archive(&self, name: &str) -> Result<Self> {
        match self {
            Self::Disk(d) => d.create_archive(name, ArchiveOptions::default()).map(Self::Archive),
            Self::Archive(a) => a.create_archive(name).map(Self::Archive),
            Self::Memory(_) => Err(MemoryDestination::unsupported("nested archives")),
        }
    }

    /// Recreate `source` (and everything below it) under this handle.
    /// Returns the number of files written.
    pub fn save_tree<S: TreeSource>(&self, source: &S) -> Result<usize> {
        tree::export_tree(source, self)
    }

    /// Release this handle. Only an archive handle that owns its encoder has
    /// anything to do here; it finalizes the archive and surfaces any error
    /// from the final flush.
    pub fn close(self) -> Result<()> {
        match self {
            Self::Archive(a) => a.close(),
            Self::Disk(_) | Self::Memory(_) => Ok(()),
        }
    }
}
