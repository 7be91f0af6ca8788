use crate::domain::error::StoreError;
use crate::domain::error::StoreError::{MissingContentType, UnsupportedMediaType};
use hyper::body::Bytes;
use image::ImageFormat;
use std::fs::File;
use std::path::Path;
use tracing::warn;

pub mod error;
pub mod filename;

/// A single uploaded file part, as declared by the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub content: Bytes,
}

/// An open handle on a stored image, ready to be streamed back.
#[derive(Debug)]
pub struct FetchedImage {
    pub file: File,
    pub format: ImageFormat,
    pub content_length: u64,
}

pub trait MediaTypePolicy {
    fn accepted_format(&self) -> Result<ImageFormat, StoreError>;
}

impl MediaTypePolicy for Option<&str> {
    /// Whitelist on the declared string only, the bytes are never sniffed.
    fn accepted_format(&self) -> Result<ImageFormat, StoreError> {
        match self {
            None => Err(MissingContentType),
            Some("image/jpeg") => Ok(ImageFormat::Jpeg),
            Some("image/png") => Ok(ImageFormat::Png),
            Some(other) => Err(UnsupportedMediaType {
                content_type: other.to_string(),
            }),
        }
    }
}

/// Media type of a stored file, going by its extension.
pub fn format_from_path(path: &Path) -> ImageFormat {
    ImageFormat::from_path(path)
        .ok()
        .filter(|format| matches!(format, ImageFormat::Jpeg | ImageFormat::Png))
        .unwrap_or_else(|| {
            warn!("Defaulting to Jpeg format for {}", path.display());
            ImageFormat::Jpeg
        })
}
