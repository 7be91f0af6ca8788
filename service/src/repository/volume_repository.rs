use crate::domain::error::StoreError;
use crate::domain::error::StoreError::{DirectoryUnavailable, InvalidFilename};
use crate::domain::filename::resolve;
use crate::domain::{format_from_path, FetchedImage, ImageUpload, MediaTypePolicy};
use crate::repository::ImageRepository;
use std::fs;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Image store backed by a single directory on a local volume.
#[derive(Debug, Clone)]
pub struct VolumeRepository {
    root: PathBuf,
}

impl VolumeRepository {
    pub fn new(root: impl Into<PathBuf>) -> VolumeRepository {
        VolumeRepository { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `create_dir_all` already treats an existing directory as success, which
    /// covers two first writers racing on the same root.
    fn ensure_root(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|e| {
            error!("Could not create upload directory {}", self.root.display());
            StoreError::io(&self.root, e)
        })
    }
}

/// A missing entry, or a root that turned out not to be a directory.
fn is_absent(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory)
}

impl ImageRepository for VolumeRepository {
    #[instrument(skip(upload), fields(filename = ?upload.filename, size = upload.content.len()))]
    fn store_image(&self, upload: &ImageUpload) -> Result<String, StoreError> {
        let timer = Instant::now();
        let format = upload.content_type.as_deref().accepted_format()?;
        let full_path = resolve(&self.root, upload.filename.as_deref())?;

        if fs::symlink_metadata(&full_path).is_ok_and(|m| m.file_type().is_symlink()) {
            warn!("Refusing to write through link at {}", full_path.display());
            return Err(InvalidFilename {
                filename: upload.filename.clone().unwrap_or_default(),
            });
        }

        self.ensure_root()?;
        fs::write(&full_path, &upload.content).map_err(|e| {
            error!("Could not write image at {}", full_path.display());
            StoreError::io(&full_path, e)
        })?;

        info!(
            "FS write took {} ms for {} ({:?})",
            timer.elapsed().as_millis(),
            full_path.display(),
            format
        );
        Ok(full_path.to_string_lossy().into_owned())
    }

    #[instrument(skip(self))]
    fn fetch_image(&self, filename: &str) -> Result<Option<FetchedImage>, StoreError> {
        let full_path = resolve(&self.root, Some(filename))?;

        // Links are not followed, so only entries List would show can be served.
        let metadata = match fs::symlink_metadata(&full_path) {
            Ok(metadata) => metadata,
            Err(e) if is_absent(&e) => {
                info!("FS has no image at {}", full_path.display());
                return Ok(None);
            }
            Err(e) => {
                error!("Could not stat image at {}", full_path.display());
                return Err(StoreError::io(&full_path, e));
            }
        };
        if !metadata.file_type().is_file() {
            info!("FS entry at {} is not a regular file", full_path.display());
            return Ok(None);
        }

        let file = match File::open(&full_path) {
            Ok(file) => file,
            // Removed between the stat and the open.
            Err(e) if is_absent(&e) => return Ok(None),
            Err(e) => {
                error!("Could not open image at {}", full_path.display());
                return Err(StoreError::io(&full_path, e));
            }
        };
        // Length of what was actually opened, not of what was stat'ed.
        let content_length = file
            .metadata()
            .map_err(|e| StoreError::io(&full_path, e))?
            .len();

        debug!("Opened image at {}", full_path.display());
        Ok(Some(FetchedImage {
            file,
            format: format_from_path(&full_path),
            content_length,
        }))
    }

    #[instrument(skip(self))]
    fn list_images(&self) -> Result<Vec<String>, StoreError> {
        info!("Listing images in {}", self.root.display());
        let unavailable = |source: io::Error| DirectoryUnavailable {
            path: self.root.clone(),
            source,
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(unavailable)? {
            let entry = entry.map_err(unavailable)?;
            let is_file = entry.file_type().map_err(unavailable)?.is_file();
            if is_file {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        debug!("Listed {} images", names.len());
        Ok(names)
    }
}
