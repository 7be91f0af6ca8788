use crate::domain::error::StoreError::{
    DirectoryUnavailable, InvalidFilename, IoFailure, MissingContentType, MissingFilename,
    UnsupportedMediaType,
};
use std::error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

/// Everything the image store can fail with. Knows nothing about HTTP.
#[derive(Debug)]
pub enum StoreError {
    MissingContentType,
    UnsupportedMediaType { content_type: String },
    MissingFilename,
    InvalidFilename { filename: String },
    DirectoryUnavailable { path: PathBuf, source: io::Error },
    IoFailure { path: PathBuf, source: io::Error },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingContentType => write!(f, "No content type was declared."),
            UnsupportedMediaType { content_type } => {
                write!(f, "Only JPEG and PNG are allowed, got {content_type}.")
            }
            MissingFilename => write!(f, "No filename was supplied."),
            InvalidFilename { filename } => write!(f, "Filename {filename:?} is not usable."),
            DirectoryUnavailable { path, .. } => {
                write!(f, "Upload directory {} is unavailable.", path.display())
            }
            IoFailure { path, .. } => write!(f, "Disk operation failed at {}.", path.display()),
        }
    }
}

impl error::Error for StoreError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            DirectoryUnavailable { source, .. } | IoFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> StoreError {
        IoFailure {
            path: path.into(),
            source,
        }
    }
}
