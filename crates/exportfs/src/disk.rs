use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::archive::{ArchiveDestination, ArchiveOptions};
use crate::document;
use crate::error::{Error, Result};
use crate::name::make_legal_name;
use crate::sink::{ByteSink, InputStream, TextSink};

/// A real directory. Each handle is an independent resource; two handles for
/// the same sub-directory write into the same place.
#[derive(Clone, Debug)]
pub struct DiskDestination {
    root: PathBuf,
    relative: String,
}

impl DiskDestination {
    /// Open `root`, creating it and its ancestors if missing.
    ///
    /// Fails with [`Error::Configuration`] when `root` exists but is not a
    /// writable directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        Self::ensure_dir(&root)?;
        Ok(Self {
            root,
            relative: String::new(),
        })
    }

    fn ensure_dir(path: &Path) -> Result<()> {
        match fs::metadata(path) {
            Ok(meta) if !meta.is_dir() => Err(Error::Configuration {
                path: path.to_path_buf(),
                reason: "not a directory",
            }),
            Ok(_) => Self::check_writable(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(path)?;
                debug!(path = %path.display(), "created export directory");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writability is tested by creating an anonymous temp file in `path`.
    fn check_writable(path: &Path) -> Result<()> {
        match tempfile::tempfile_in(path) {
            Ok(_) => Ok(()),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem
                ) =>
            {
                Err(Error::Configuration {
                    path: path.to_path_buf(),
                    reason: "directory is not writable",
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn location(&self) -> String {
        self.root.display().to_string()
    }

    pub fn make_legal_name<'n>(&self, name: &'n str) -> Cow<'n, str> {
        make_legal_name(name)
    }

    pub fn relative_path(&self, name: &str) -> String {
        format!("{}{}", self.relative, make_legal_name(name))
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(&*make_legal_name(name))
    }

    /// Create (or truncate) `name` for writing.
    pub fn byte_sink<'a>(&self, name: &str) -> Result<ByteSink<'a>> {
        let path = self.path(name);
        let file = File::create(&path)?;
        debug!(path = %path.display(), "opened file for writing");
        Ok(ByteSink::File(BufWriter::new(file)))
    }

    pub fn text_sink<'a>(&self, name: &str) -> Result<TextSink<'a>> {
        Ok(TextSink::Bytes(self.byte_sink(name)?))
    }

    pub fn input_stream(&self, name: &str) -> Result<Option<InputStream>> {
        match File::open(self.path(name)) {
            Ok(file) if file.metadata()?.is_dir() => Ok(None),
            Ok(file) => Ok(Some(InputStream::File(BufReader::new(file)))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Serialize into a temporary file next to the target, then rename it
    /// into place, so a failed serialization never leaves a truncated file.
    pub fn write_document<T: Serialize + ?Sized>(&self, name: &str, doc: &T) -> Result<()> {
        let path = self.path(name);
        let mut tmp = tempfile::Builder::new()
            .prefix(".exportfs-")
            .suffix(".tmp")
            .tempfile_in(&self.root)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            document::serialize(doc, &mut writer)?;
            writer.flush()?;
        }
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(path = %path.display(), "wrote structured document");
        Ok(())
    }

    pub fn read_document<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.input_stream(name)? {
            Some(stream) => document::parse(stream).map(Some),
            None => Ok(None),
        }
    }

    pub fn list_files(&self) -> Result<Vec<String>> {
        self.list(|path| path.is_file())
    }

    pub fn list_dirs(&self) -> Result<Vec<String>> {
        self.list(|path| path.is_dir())
    }

    fn list(&self, keep: impl Fn(&Path) -> bool) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if keep(entry.path().as_path()) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove file `name`, or the directory `name` if it is empty.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let path = self.path(name);
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            fs::remove_dir(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        debug!(path = %path.display(), "deleted");
        Ok(true)
    }

    /// Sub-directory `name`, created on first use.
    pub fn dir(&self, name: &str) -> Result<Self> {
        let legal = make_legal_name(name);
        let root = self.root.join(&*legal);
        Self::ensure_dir(&root)?;
        Ok(Self {
            root,
            relative: format!("{}{}/", self.relative, legal),
        })
    }

    /// New zip file `name` in this directory, owned by the returned handle.
    pub fn create_archive<'a>(&self, name: &str, options: ArchiveOptions) -> Result<ArchiveDestination<'a>> {
        ArchiveDestination::create(&self.root, name, options)
    }
}
