//! Streaming zip extraction.
//!
//! Every entry is validated by [`resolve_contained`] before anything is
//! created for it. File contents are copied straight from the decoder into
//! the destination file; the decoder itself stays open across entries and is
//! dropped once, when extraction ends.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::options::{CollisionPolicy, ExtractOptions, Progress};
use crate::sanitize::{canonical_root, resolve_contained};

/// Extract every entry of the archive read from `reader` under `destination`.
///
/// `destination` is created if missing. Returns the paths created, in archive
/// order: regular files always, directories only when
/// [`ExtractOptions::include_directories`] is set.
///
/// A traversal attempt aborts the whole extraction; files written for earlier
/// entries are left in place for the caller to clean up.
pub fn extract<R: Read + Seek>(
    reader: R,
    destination: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<Vec<PathBuf>> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let total_entries = archive.len();
    let mut run = Extraction::start(destination.as_ref(), options, total_entries)?;

    for index in 0..total_entries {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_owned();
        let is_dir = entry.is_dir();
        run.entry(&mut entry, &name, is_dir)?;
    }

    Ok(run.finish())
}

/// Like [`extract`], for a reader that cannot seek, e.g. a network body.
///
/// Entries are read from their local headers in stream order, so the entry
/// count is unknown and [`Progress::total_entries`] stays `0`. Entries whose
/// sizes were deferred to a trailing data descriptor cannot be read this way.
pub fn extract_stream<R: Read>(
    mut reader: R,
    destination: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<Vec<PathBuf>> {
    let mut run = Extraction::start(destination.as_ref(), options, 0)?;

    while let Some(mut entry) = zip::read::read_zipfile_from_stream(&mut reader)? {
        let name = entry.name().to_owned();
        let is_dir = entry.is_dir();
        run.entry(&mut entry, &name, is_dir)?;
    }

    Ok(run.finish())
}

/// State shared by the seekable and streaming loops.
struct Extraction<'o> {
    root: PathBuf,
    options: &'o ExtractOptions,
    total_entries: usize,
    entries_processed: usize,
    bytes_processed: u64,
    created: Vec<PathBuf>,
}

impl<'o> Extraction<'o> {
    fn start(destination: &Path, options: &'o ExtractOptions, total_entries: usize) -> Result<Self> {
        create_dir(destination)?;
        let root = canonical_root(destination)?;
        debug!(destination = %root.display(), entries = total_entries, "extracting archive");
        Ok(Self {
            root,
            options,
            total_entries,
            entries_processed: 0,
            bytes_processed: 0,
            created: Vec::new(),
        })
    }

    fn entry<E: Read>(&mut self, entry: &mut E, name: &str, is_dir: bool) -> Result<()> {
        let target = resolve_contained(name, &self.root)?;

        if is_dir {
            create_dir(&target.resolved)?;
            if self.options.include_directories {
                self.created.push(target.resolved.clone());
            }
        } else if let Some(written) = write_entry(entry, name, &target.resolved, self.options)? {
            trace!(entry = %name, bytes = written, "extracted file");
            self.bytes_processed += written;
            self.created.push(target.resolved.clone());
        }

        self.entries_processed += 1;
        self.options.report(Progress {
            bytes_processed: self.bytes_processed,
            entries_processed: self.entries_processed,
            total_entries: self.total_entries,
            current_entry: Some(target.resolved),
        });
        Ok(())
    }

    fn finish(self) -> Vec<PathBuf> {
        debug!(created = self.created.len(), bytes = self.bytes_processed, "extraction finished");
        self.created
    }
}

/// Convenience wrapper around [`extract`] for an archive on disk.
pub fn extract_file(
    archive: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<Vec<PathBuf>> {
    let archive = archive.as_ref();
    let file = File::open(archive).map_err(|e| Error::ExtractionFailed {
        path: archive.to_path_buf(),
        source: e,
    })?;
    extract(io::BufReader::new(file), destination, options)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::DirectoryCreationFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Returns `None` when the entry was skipped because of a collision.
fn write_entry<R: Read>(
    entry: &mut R,
    name: &str,
    path: &Path,
    options: &ExtractOptions,
) -> Result<Option<u64>> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }

    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return match options.collision {
                CollisionPolicy::Abort => Err(Error::Collision {
                    entry: name.to_owned(),
                    path: path.to_path_buf(),
                }),
                CollisionPolicy::Skip => {
                    warn!(entry = %name, path = %path.display(), "skipping existing file");
                    Ok(None)
                }
            };
        }
        Err(e) => {
            return Err(Error::ExtractionFailed {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    let mut out = BufWriter::new(file);
    let written = io::copy(entry, &mut out).map_err(|e| Error::ExtractionFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    out.flush().map_err(|e| Error::ExtractionFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(Some(written))
}
