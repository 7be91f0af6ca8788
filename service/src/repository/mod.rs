use crate::domain::error::StoreError;
use crate::domain::{FetchedImage, ImageUpload};

pub(crate) mod volume_repository;

/// Blocking image storage. Callers on the async side go through
/// `spawn_blocking`.
pub trait ImageRepository: Send + Sync + 'static {
    /// Persist an upload and return the path it was written to.
    fn store_image(&self, upload: &ImageUpload) -> Result<String, StoreError>;

    /// `Ok(None)` when nothing is stored under `filename`.
    fn fetch_image(&self, filename: &str) -> Result<Option<FetchedImage>, StoreError>;

    fn list_images(&self) -> Result<Vec<String>, StoreError>;
}
