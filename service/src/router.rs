use crate::domain::error::StoreError::InvalidFilename;
use crate::observability::remote_context;
use crate::repository::ImageRepository;
use crate::response_handler::{
    empty, fetch_response, full, list_response, upload_response, ResponseBody, ResultResponse,
};
use crate::service::ErrorResponse::Store;
use crate::service::ImageService;
use hyper::body::{Body, Bytes};
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};
use hyper::{Method, Request, Response, StatusCode};
use percent_encoding::percent_decode_str;
use std::error;
use std::sync::Arc;
use tracing::instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const IMAGES_PATH: &str = "/api/uploads/images";
const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

#[instrument(skip_all, fields(method = %req.method(), path = %req.uri().path()))]
pub async fn router<R, B>(req: Request<B>, service: Arc<ImageService<R>>) -> ResultResponse
where
    R: ImageRepository,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn error::Error + Send + Sync>> + Send + 'static,
{
    tracing::Span::current().set_parent(remote_context(req.headers()));

    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let mut response = match (&method, path.as_str()) {
        (&Method::GET, "/private/status") => Response::new(full("OK")),
        (&Method::OPTIONS, _) => preflight()?,
        (&Method::POST, IMAGES_PATH) => {
            let (parts, body) = req.into_parts();
            upload_response(service.process_upload(&parts.headers, body).await)?
        }
        (&Method::GET, IMAGES_PATH) => list_response(service.process_list().await)?,
        (&Method::GET, path) => match image_name(path) {
            Some(Ok(filename)) => fetch_response(service.process_fetch(&filename).await)?,
            Some(Err(raw)) => fetch_response(Err(Store(InvalidFilename { filename: raw })))?,
            None => not_found()?,
        },
        _ => not_found()?,
    };

    response.headers_mut().insert(
        ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    Ok(response)
}

/// The `{fileName}` segment of `/api/uploads/images/{fileName}`, percent-decoded.
///
/// `None` when the path is not a single-image path at all, `Err` with the raw
/// segment when it does not decode to UTF-8.
fn image_name(path: &str) -> Option<Result<String, String>> {
    let raw = path.strip_prefix(IMAGES_PATH)?.strip_prefix('/')?;
    if raw.is_empty() || raw.contains('/') {
        return None;
    }
    Some(
        percent_decode_str(raw)
            .decode_utf8()
            .map(|name| name.into_owned())
            .map_err(|_| raw.to_string()),
    )
}

fn preflight() -> Result<Response<ResponseBody>, hyper::http::Error> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS)
        .header(ACCESS_CONTROL_ALLOW_HEADERS, "*")
        .body(empty())
}

fn not_found() -> Result<Response<ResponseBody>, hyper::http::Error> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(full("Endpoint not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::tests::{form_body, form_headers};
    use crate::repository::volume_repository::VolumeRepository;
    use http_body_util::{BodyExt, Full};
    use hyper::header::CONTENT_TYPE;
    use std::path::Path;

    fn service(root: &Path) -> Arc<ImageService<VolumeRepository>> {
        Arc::new(ImageService::new(VolumeRepository::new(root), 1024 * 1024))
    }

    fn get(uri: &str) -> Request<Full<Bytes>> {
        Request::get(uri).body(Full::new(Bytes::new())).unwrap()
    }

    fn upload(filename: &str, content_type: &str, content: &[u8]) -> Request<Full<Bytes>> {
        let mut builder = Request::post(IMAGES_PATH);
        for (name, value) in form_headers().iter() {
            builder = builder.header(name, value);
        }
        builder
            .body(Full::new(Bytes::from(form_body(
                "file",
                filename,
                Some(content_type),
                content,
            ))))
            .unwrap()
    }

    async fn body_bytes(response: Response<ResponseBody>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[test]
    fn image_name_extracts_single_segment() {
        assert_eq!(
            image_name("/api/uploads/images/cat.png"),
            Some(Ok("cat.png".to_string()))
        );
        assert_eq!(
            image_name("/api/uploads/images/my%20cat.png"),
            Some(Ok("my cat.png".to_string()))
        );
        assert_eq!(image_name("/api/uploads/images/"), None);
        assert_eq!(image_name("/api/uploads/images/a/b.png"), None);
        assert_eq!(image_name("/api/uploads/imagesX"), None);
        assert!(matches!(image_name("/api/uploads/images/%FF.png"), Some(Err(_))));
    }

    #[tokio::test]
    async fn upload_fetch_list_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let payload = [42u8; 37];

        let response = router(upload("cat.png", "image/png", &payload), service.clone())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(json["filepath"].as_str().unwrap().ends_with("cat.png"));

        let response = router(get("/api/uploads/images/cat.png"), service.clone())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
        assert_eq!(&body_bytes(response).await[..], &payload[..]);

        let response = router(get(IMAGES_PATH), service).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["images"], serde_json::json!(["cat.png"]));
    }

    #[tokio::test]
    async fn unsupported_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let response = router(upload("notes.txt", "text/plain", b"hi"), service.clone())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let response = router(get(IMAGES_PATH), service).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["images"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn missing_image_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let response = router(get("/api/uploads/images/ghost.png"), service(dir.path()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn encoded_traversal_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("uploads");
        std::fs::write(dir.path().join("secret.png"), b"secret").unwrap();

        let response = router(get("/api/uploads/images/..%2Fsecret.png"), service(&root))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router(get("/api/uploads/images/..%2F"), service(&root))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn listing_missing_root_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let response = router(get(IMAGES_PATH), service(&dir.path().join("absent")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn status_preflight_and_unknown_routes() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let response = router(get("/private/status"), service.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let preflight = Request::options(IMAGES_PATH)
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = router(preflight, service.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_METHODS], ALLOWED_METHODS);

        let response = router(get("/nowhere"), service.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let delete = Request::delete("/api/uploads/images/cat.png")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = router(delete, service).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
