use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unusable destination '{path}': {reason}")]
    Configuration { path: PathBuf, reason: &'static str },

    #[error("{operation} is unsupported for {medium}")]
    Unsupported {
        operation: &'static str,
        medium: &'static str,
    },

    #[error("malformed structured document: {0}")]
    Document(#[source] serde_json::Error),

    #[error("archive encoder failed: {0}")]
    Archive(#[source] zip::result::ZipError),

    #[error("cannot open archive entry '{requested}' while '{open}' is still open")]
    EntryInFlight { open: String, requested: String },

    #[error("archive '{location}' is already finalized")]
    ArchiveFinished { location: String },

    #[error("archive encoder lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Extract(#[from] exportfs_archive::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn unsupported(operation: &'static str, medium: &'static str) -> Self {
        Self::Unsupported { operation, medium }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::Archive(other),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Self::Io(e.into())
        } else {
            Self::Document(e)
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(io) => io,
            other => io::Error::other(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
