use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("zip-slip attack detected: entry '{entry}' resolves to '{resolved}'")]
    PathTraversal { entry: String, resolved: PathBuf },

    #[error("entry '{entry}' would overwrite existing file '{path}'")]
    Collision { entry: String, path: PathBuf },

    #[error("entry name is empty or contains a null byte: {entry:?}")]
    InvalidPath { entry: String },

    #[error("malformed archive: {0}")]
    Format(#[source] zip::result::ZipError),

    #[error("failed to create directory: {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::Format(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
