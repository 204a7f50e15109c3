//! Per-entry byte and text sinks, and the read-side stream.
//!
//! A sink stands for exactly one entry. `close` consumes it, so an entry can
//! only be finalized once, and it is the only way to learn whether the final
//! flush succeeded. Dropping a sink without closing it still releases the
//! entry but discards any flush error.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};

use crate::archive::EntrySink;
use crate::error::Result;
use crate::memory::MemoryBuffer;

/// Binary sink for one entry.
pub enum ByteSink<'a> {
    File(BufWriter<File>),
    Entry(BufWriter<EntrySink<'a>>),
}

impl ByteSink<'_> {
    /// Flush and finalize the entry. For an archive entry this releases the
    /// shared encoder for the next entry; the encoder itself stays open.
    pub fn close(self) -> Result<()> {
        match self {
            Self::File(writer) => {
                writer.into_inner().map_err(|e| e.into_error())?;
            }
            Self::Entry(writer) => {
                let entry = writer.into_inner().map_err(|e| e.into_error())?;
                entry.close()?;
            }
        }
        Ok(())
    }
}

impl Write for ByteSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::File(w) => w.write(buf),
            Self::Entry(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(w) => w.flush(),
            Self::Entry(w) => w.flush(),
        }
    }
}

/// UTF-8 text sink for one entry.
///
/// Strings written through [`TextSink::write_str`] or `write!` are encoded as
/// UTF-8 whatever the platform; no byte-order mark is emitted.
pub enum TextSink<'a> {
    Bytes(ByteSink<'a>),
    Memory(MemoryBuffer),
}

impl TextSink<'_> {
    pub fn write_str(&mut self, text: &str) -> Result<()> {
        self.write_all(text.as_bytes())?;
        Ok(())
    }

    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.write_str(line)?;
        self.write_str("\n")
    }

    pub fn close(self) -> Result<()> {
        match self {
            Self::Bytes(sink) => sink.close(),
            Self::Memory(_) => Ok(()),
        }
    }
}

impl Write for TextSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Bytes(sink) => sink.write(buf),
            Self::Memory(buffer) => buffer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Bytes(sink) => sink.flush(),
            Self::Memory(buffer) => buffer.flush(),
        }
    }
}

/// Read-side stream for an existing entry.
pub enum InputStream {
    File(BufReader<File>),
    Buffer(Cursor<Vec<u8>>),
}

impl Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::File(r) => r.read(buf),
            Self::Buffer(r) => r.read(buf),
        }
    }
}
