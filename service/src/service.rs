use crate::domain::error::StoreError;
use crate::domain::FetchedImage;
use crate::multipart::{read_upload, FormError};
use crate::repository::ImageRepository;
use crate::server_timing::timing::Timing;
use crate::server_timing::ServerTiming;
use crate::service::ErrorResponse::{Form, Store, Task};
use hyper::body::{Body, Bytes};
use hyper::HeaderMap;
use std::error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinError;
use tracing::{debug, instrument, Span};

/// Why a request could not be served.
#[derive(Debug)]
pub enum ErrorResponse {
    Form(FormError),
    Store(StoreError),
    Task(JoinError),
}

impl Display for ErrorResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Form(e) => write!(f, "{e}"),
            Store(e) => write!(f, "{e}"),
            Task(e) => write!(f, "Storage task failed: {e}"),
        }
    }
}

impl error::Error for ErrorResponse {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Form(e) => Some(e),
            Store(e) => Some(e),
            Task(e) => Some(e),
        }
    }
}

/// Result of a store operation with how long it took on disk.
#[derive(Debug)]
pub struct Timed<T> {
    pub value: T,
    pub server_timing: ServerTiming,
}

pub type InternalResponse<T> = Result<Timed<T>, ErrorResponse>;

/// Async face of an `ImageRepository`.
pub struct ImageService<R> {
    repository: Arc<R>,
    max_upload_bytes: u64,
}

impl<R: ImageRepository> ImageService<R> {
    pub fn new(repository: R, max_upload_bytes: u64) -> ImageService<R> {
        ImageService {
            repository: Arc::new(repository),
            max_upload_bytes,
        }
    }

    #[instrument(skip_all)]
    pub async fn process_upload<B>(&self, headers: &HeaderMap, body: B) -> InternalResponse<String>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn error::Error + Send + Sync>> + Send + 'static,
    {
        let upload = read_upload(headers, body, self.max_upload_bytes)
            .await
            .map_err(Form)?;
        self.blocking("store", move |repository| repository.store_image(&upload))
            .await
    }

    #[instrument(skip(self))]
    pub async fn process_fetch(&self, filename: &str) -> InternalResponse<Option<FetchedImage>> {
        let filename = filename.to_string();
        self.blocking("fetch", move |repository| repository.fetch_image(&filename))
            .await
    }

    #[instrument(skip(self))]
    pub async fn process_list(&self) -> InternalResponse<Vec<String>> {
        self.blocking("list", |repository| repository.list_images())
            .await
    }

    /// Filesystem calls are synchronous; keep them off the reactor threads.
    async fn blocking<T, F>(&self, name: &'static str, op: F) -> InternalResponse<T>
    where
        T: Send + 'static,
        F: FnOnce(&R) -> Result<T, StoreError> + Send + 'static,
    {
        let repository = Arc::clone(&self.repository);
        let span = Span::current();
        let timer = Instant::now();

        let value = tokio::task::spawn_blocking(move || span.in_scope(|| op(repository.as_ref())))
            .await
            .map_err(Task)?
            .map_err(Store)?;

        let elapsed = timer.elapsed();
        debug!("{name} finished in {} ms", elapsed.as_millis());
        Ok(Timed {
            value,
            server_timing: ServerTiming::new(vec![Timing::new(name, elapsed, None)]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::tests::{form_body, form_headers};
    use crate::repository::volume_repository::VolumeRepository;
    use http_body_util::Full;
    use std::io::Read;

    fn service(root: &std::path::Path) -> ImageService<VolumeRepository> {
        ImageService::new(VolumeRepository::new(root), 1024 * 1024)
    }

    #[tokio::test]
    async fn upload_fetch_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let payload = [9u8; 37];

        let body = form_body("file", "cat.png", Some("image/png"), &payload);
        let stored = service
            .process_upload(&form_headers(), Full::new(Bytes::from(body)))
            .await
            .unwrap();
        assert!(stored.value.ends_with("cat.png"));
        assert!(stored.server_timing.to_string().starts_with("store;dur="));

        let fetched = service.process_fetch("cat.png").await.unwrap().value.unwrap();
        let mut file = fetched.file;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, payload);

        let listed = service.process_list().await.unwrap();
        assert_eq!(listed.value, vec!["cat.png".to_string()]);
    }

    #[tokio::test]
    async fn store_errors_surface_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let body = form_body("file", "notes.txt", Some("text/plain"), b"hello");
        let err = service
            .process_upload(&form_headers(), Full::new(Bytes::from(body)))
            .await
            .unwrap_err();
        assert!(matches!(err, Store(StoreError::UnsupportedMediaType { .. })));
    }

    #[tokio::test]
    async fn form_errors_surface_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("uploads");
        let service = service(&root);

        let err = service
            .process_upload(&HeaderMap::new(), Full::new(Bytes::from_static(b"x")))
            .await
            .unwrap_err();
        assert!(matches!(err, Form(FormError::NotMultipart)));
        assert!(!root.exists());
    }
}
