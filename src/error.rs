use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::codec::CodecError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("not a directory: {}", .0.display())]
    InvalidDirectory(PathBuf),

    #[error("already tracked: {}", .0.display())]
    DuplicateEntry(PathBuf),

    #[error("not tracked: {}", .0.display())]
    NotFound(PathBuf),

    #[error("no supported images in the working directory")]
    EmptyIndex,

    #[error("could not decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// The file behind a tracked record is gone from disk.
    #[error("file no longer exists: {}", .0.display())]
    FileMissing(PathBuf),

    #[error("viewer has been shut down")]
    AlreadyShutDown,

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
