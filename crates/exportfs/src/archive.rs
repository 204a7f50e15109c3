//! Write-only medium backed by one streaming zip encoder.
//!
//! Every handle derived from a top-level archive through [`ArchiveDestination::dir`]
//! shares the same encoder and only differs by its entry-path prefix. Only the
//! handle that created the encoder owns it, and only the owner's `close`
//! writes the central directory.
//!
//! The encoder accepts one open entry at a time. Opening a second entry while
//! an [`EntrySink`] for the first is still alive fails with
//! [`Error::EntryInFlight`] instead of interleaving bytes.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};
use zip::write::{SimpleFileOptions, StreamWriter};
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};
use crate::name::make_legal_name;
use crate::sink::{ByteSink, TextSink};

const MEDIUM: &str = "write-only archive";

/// Whether closing the top-level archive also releases the physical sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SinkOwnership {
    /// Close syncs files to storage and drops the writer.
    #[default]
    Owned,
    /// Close only flushes; the caller keeps using the sink afterwards.
    Borrowed,
}

#[derive(Clone, Debug)]
pub struct ArchiveOptions {
    pub compression: CompressionMethod,
    pub comment: Option<String>,
    pub large_files: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
            comment: None,
            large_files: false,
        }
    }
}

impl ArchiveOptions {
    pub fn compression(mut self, method: CompressionMethod) -> Self {
        self.compression = method;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn large_files(mut self, large: bool) -> Self {
        self.large_files = large;
        self
    }

    fn file_options(&self) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(self.compression)
            .large_file(self.large_files)
            .unix_permissions(0o644)
    }

    fn nested_archive_options(&self) -> SimpleFileOptions {
        self.file_options().compression_method(CompressionMethod::Stored)
    }
}

/// Physical destination of an encoder.
pub(crate) enum ArchiveSink<'a> {
    File(BufWriter<File>),
    /// An entry of an enclosing archive (zip-within-zip).
    Entry(EntrySink<'a>),
    Writer(Box<dyn Write + Send + 'a>),
}

impl ArchiveSink<'_> {
    fn release(self, ownership: SinkOwnership) -> Result<()> {
        match self {
            Self::File(writer) => {
                let file = writer.into_inner().map_err(|e| e.into_error())?;
                if ownership == SinkOwnership::Owned {
                    file.sync_all()?;
                }
            }
            Self::Entry(entry) => entry.close()?,
            Self::Writer(mut writer) => writer.flush()?,
        }
        Ok(())
    }
}

impl Write for ArchiveSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::File(w) => w.write(buf),
            Self::Entry(w) => w.write(buf),
            Self::Writer(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(w) => w.flush(),
            Self::Entry(w) => w.flush(),
            Self::Writer(w) => w.flush(),
        }
    }
}

/// Refuses all bytes once the encoder owning it has been abandoned, so the
/// zip writer's own drop-time finalization cannot complete the archive.
struct GuardedSink<'a> {
    sink: ArchiveSink<'a>,
    abandoned: Arc<AtomicBool>,
}

impl GuardedSink<'_> {
    fn check(&self) -> io::Result<()> {
        if self.abandoned.load(Ordering::Acquire) {
            return Err(io::Error::other("archive was dropped without close"));
        }
        Ok(())
    }
}

impl Write for GuardedSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check()?;
        self.sink.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check()?;
        self.sink.flush()
    }
}

type ZipStream<'a> = ZipWriter<StreamWriter<GuardedSink<'a>>>;

struct Encoder<'a> {
    writer: Option<ZipStream<'a>>,
    open_entry: Option<String>,
    ownership: SinkOwnership,
    location: Arc<str>,
    abandoned: Arc<AtomicBool>,
}

/// Only the owner's `close` takes the writer out. An encoder that still has
/// one here was abandoned: the archive stays unfinalized.
impl Drop for Encoder<'_> {
    fn drop(&mut self) {
        if self.writer.is_some() {
            self.abandoned.store(true, Ordering::Release);
            warn!(archive = %self.location, "archive dropped without close, left unfinalized");
        }
    }
}

type SharedEncoder<'a> = Arc<Mutex<Encoder<'a>>>;

fn lock<'g, 'a>(encoder: &'g SharedEncoder<'a>) -> Result<MutexGuard<'g, Encoder<'a>>> {
    encoder.lock().map_err(|_| Error::Poisoned)
}

impl<'a> Encoder<'a> {
    fn start_entry(&mut self, name: &str, options: SimpleFileOptions) -> Result<()> {
        if let Some(open) = &self.open_entry {
            return Err(Error::EntryInFlight {
                open: open.clone(),
                requested: name.to_owned(),
            });
        }
        let writer = self.writer.as_mut().ok_or_else(|| Error::ArchiveFinished {
            location: self.location.to_string(),
        })?;
        writer.start_file(name, options)?;
        self.open_entry = Some(name.to_owned());
        Ok(())
    }

    fn entry_writer(&mut self, name: &str) -> io::Result<&mut ZipStream<'a>> {
        if self.open_entry.as_deref() != Some(name) {
            return Err(io::Error::other(format!("archive entry '{name}' is already closed")));
        }
        self.writer.as_mut().ok_or_else(|| {
            io::Error::other(Error::ArchiveFinished {
                location: self.location.to_string(),
            })
        })
    }
}

/// Byte sink for the single open entry of a shared encoder.
///
/// Closing it ends the entry, never the encoder: sibling handles still need
/// the encoder, and the entry's sizes are written when the next entry starts
/// or the owner finalizes the archive.
pub struct EntrySink<'a> {
    encoder: SharedEncoder<'a>,
    name: String,
    closed: bool,
}

impl EntrySink<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut encoder = lock(&self.encoder)?;
        if encoder.open_entry.as_deref() == Some(self.name.as_str()) {
            encoder.open_entry = None;
        }
        debug!(entry = %self.name, "closed archive entry");
        Ok(())
    }
}

impl Write for EntrySink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut encoder = lock(&self.encoder)?;
        encoder.entry_writer(&self.name)?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut encoder = lock(&self.encoder)?;
        match encoder.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for EntrySink<'_> {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// A directory-like view onto a streaming zip encoder.
pub struct ArchiveDestination<'a> {
    encoder: SharedEncoder<'a>,
    prefix: String,
    owns_encoder: bool,
    options: ArchiveOptions,
    location: Arc<str>,
}

impl<'a> ArchiveDestination<'a> {
    /// Create `dir/file_name` and an owning archive over it.
    pub fn create(dir: impl AsRef<Path>, file_name: &str, options: ArchiveOptions) -> Result<Self> {
        let path = dir.as_ref().join(&*make_legal_name(file_name));
        let file = File::create(&path)?;
        debug!(path = %path.display(), "created archive file");
        Ok(Self::with_sink(
            ArchiveSink::File(BufWriter::new(file)),
            SinkOwnership::Owned,
            path.display().to_string().into(),
            options,
        ))
    }

    /// Archive over any byte sink, such as an HTTP response body. The writer
    /// is dropped when the archive is closed.
    pub fn from_writer<W: Write + Send + 'a>(writer: W, options: ArchiveOptions) -> Self {
        Self::from_stream(writer, SinkOwnership::Owned, options)
    }

    /// Archive over a sink the caller keeps; close flushes but leaves it usable.
    pub fn from_borrowed<W: Write + Send>(writer: &'a mut W, options: ArchiveOptions) -> Self {
        Self::from_stream(writer, SinkOwnership::Borrowed, options)
    }

    pub fn from_stream<W: Write + Send + 'a>(
        writer: W,
        ownership: SinkOwnership,
        options: ArchiveOptions,
    ) -> Self {
        Self::with_sink(
            ArchiveSink::Writer(Box::new(writer)),
            ownership,
            "stream".into(),
            options,
        )
    }

    fn with_sink(
        sink: ArchiveSink<'a>,
        ownership: SinkOwnership,
        location: Arc<str>,
        options: ArchiveOptions,
    ) -> Self {
        let abandoned = Arc::new(AtomicBool::new(false));
        let mut writer = ZipWriter::new_stream(GuardedSink {
            sink,
            abandoned: Arc::clone(&abandoned),
        });
        if let Some(comment) = &options.comment {
            writer.set_comment(comment.clone());
        }
        let encoder = Encoder {
            writer: Some(writer),
            open_entry: None,
            ownership,
            location: Arc::clone(&location),
            abandoned,
        };
        Self {
            encoder: Arc::new(Mutex::new(encoder)),
            prefix: String::new(),
            owns_encoder: true,
            options,
            location,
        }
    }

    pub fn location(&self) -> String {
        if self.prefix.is_empty() {
            self.location.to_string()
        } else {
            format!("{}!/{}", self.location, self.prefix)
        }
    }

    pub fn owns_encoder(&self) -> bool {
        self.owns_encoder
    }

    pub fn make_legal_name<'n>(&self, name: &'n str) -> Cow<'n, str> {
        make_legal_name(name)
    }

    /// Entry path of `name` under this handle's prefix.
    pub fn relative_path(&self, name: &str) -> String {
        format!("{}{}", self.prefix, make_legal_name(name))
    }

    pub fn byte_sink(&self, name: &str) -> Result<ByteSink<'a>> {
        let entry = self.open_entry(name, self.options.file_options())?;
        Ok(ByteSink::Entry(BufWriter::new(entry)))
    }

    pub fn text_sink(&self, name: &str) -> Result<TextSink<'a>> {
        Ok(TextSink::Bytes(self.byte_sink(name)?))
    }

    fn open_entry(&self, name: &str, options: SimpleFileOptions) -> Result<EntrySink<'a>> {
        let path = self.relative_path(name);
        lock(&self.encoder)?.start_entry(&path, options)?;
        debug!(archive = %self.location, entry = %path, "opened archive entry");
        Ok(EntrySink {
            encoder: Arc::clone(&self.encoder),
            name: path,
            closed: false,
        })
    }

    /// Handle for `name/` sharing this encoder. Nothing is written until an
    /// entry is opened under it.
    pub fn dir(&self, name: &str) -> Self {
        Self {
            encoder: Arc::clone(&self.encoder),
            prefix: format!("{}/", self.relative_path(name)),
            owns_encoder: false,
            options: self.options.clone(),
            location: Arc::clone(&self.location),
        }
    }

    /// Open entry `name` and start a new encoder inside it.
    ///
    /// The returned handle owns the inner encoder; closing it finalizes the
    /// inner archive and then the outer entry, leaving the outer encoder open.
    pub fn create_archive(&self, name: &str) -> Result<Self> {
        let entry = self.open_entry(name, self.options.nested_archive_options())?;
        let location: Arc<str> = format!("{}!/{}", self.location, entry.name()).into();
        debug!(archive = %location, "opened nested archive");
        Ok(Self::with_sink(
            ArchiveSink::Entry(entry),
            SinkOwnership::Owned,
            location,
            self.options.clone(),
        ))
    }

    /// Finalize the archive if this handle owns the encoder; otherwise a no-op.
    pub fn close(self) -> Result<()> {
        if !self.owns_encoder {
            return Ok(());
        }

        let mut encoder = lock(&self.encoder)?;
        let Some(writer) = encoder.writer.take() else {
            return Ok(());
        };
        if let Some(open) = encoder.open_entry.take() {
            warn!(archive = %self.location, entry = %open, "finalizing archive with an entry still open");
        }
        let sink = writer.finish()?.into_inner().sink;
        sink.release(encoder.ownership)?;
        debug!(archive = %self.location, "finalized archive");
        Ok(())
    }

    pub(crate) fn unsupported(operation: &'static str) -> Error {
        Error::unsupported(operation, MEDIUM)
    }
}
