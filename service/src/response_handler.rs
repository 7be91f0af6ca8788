use crate::domain::error::StoreError::{
    DirectoryUnavailable, InvalidFilename, IoFailure, MissingContentType, MissingFilename,
    UnsupportedMediaType,
};
use crate::domain::FetchedImage;
use crate::multipart::FormError;
use crate::server_timing::ServerTiming;
use crate::service::ErrorResponse::{Form, Store, Task};
use crate::service::{ErrorResponse, InternalResponse, Timed};
use futures_util::TryStreamExt;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::{error, io};
use tokio_util::io::ReaderStream;
use tracing::{error, instrument, warn};

const SERVER_TIMING_HEADER_NAME: &str = "Server-Timing";
const JSON_CONTENT_TYPE: &str = "application/json";

pub type ResponseBody = BoxBody<Bytes, io::Error>;
pub type ResultResponse = Result<Response<ResponseBody>, Box<dyn error::Error + Send + Sync>>;

#[derive(Serialize)]
struct UploadBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filepath: Option<&'a str>,
}

#[derive(Serialize)]
struct ListBody<'a> {
    message: &'a str,
    images: &'a [String],
}

#[derive(Serialize)]
struct ListFailureBody<'a> {
    #[serde(rename = "internalServerError")]
    internal_server_error: &'a str,
}

impl ErrorResponse {
    /// Transport status for a failure. The store itself never sees these.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Store(UnsupportedMediaType { .. }) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Store(MissingContentType | MissingFilename | InvalidFilename { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Store(DirectoryUnavailable { .. } | IoFailure { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Form(FormError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            Form(_) => StatusCode::BAD_REQUEST,
            Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn log(&self) {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{self} ({status})");
        } else {
            warn!("{self} ({status})");
        }
    }
}

#[instrument(skip_all)]
pub fn upload_response(response: InternalResponse<String>) -> ResultResponse {
    match response {
        Ok(Timed {
            value: path,
            server_timing,
        }) => json_response(
            StatusCode::OK,
            &UploadBody {
                message: "Image uploaded successfully.",
                filepath: Some(&path),
            },
            Some(&server_timing),
        ),
        Err(e) => {
            e.log();
            json_response(
                e.status_code(),
                &UploadBody {
                    message: "Error uploading image",
                    filepath: None,
                },
                None,
            )
        }
    }
}

#[instrument(skip_all)]
pub fn fetch_response(response: InternalResponse<Option<FetchedImage>>) -> ResultResponse {
    match response {
        Ok(Timed {
            value: Some(image),
            server_timing,
        }) => {
            let file = tokio::fs::File::from_std(image.file);
            let stream = ReaderStream::new(file).map_ok(Frame::data);
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, image.format.to_mime_type())
                .header(CONTENT_LENGTH, image.content_length)
                .header(SERVER_TIMING_HEADER_NAME, server_timing.to_string())
                .body(StreamBody::new(stream).boxed())?)
        }
        Ok(Timed { value: None, .. }) => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(empty())?),
        Err(e) => {
            e.log();
            Ok(Response::builder().status(e.status_code()).body(empty())?)
        }
    }
}

#[instrument(skip_all)]
pub fn list_response(response: InternalResponse<Vec<String>>) -> ResultResponse {
    match response {
        Ok(Timed {
            value: images,
            server_timing,
        }) => json_response(
            StatusCode::OK,
            &ListBody {
                message: "Images listed successfully.",
                images: &images,
            },
            Some(&server_timing),
        ),
        Err(e) => {
            e.log();
            json_response(
                e.status_code(),
                &ListFailureBody {
                    internal_server_error: "UPLOAD_DIR not found!",
                },
                None,
            )
        }
    }
}

fn json_response<T: Serialize>(
    status: StatusCode,
    body: &T,
    server_timing: Option<&ServerTiming>,
) -> ResultResponse {
    let mut builder = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, JSON_CONTENT_TYPE);
    if let Some(server_timing) = server_timing.filter(|timing| !timing.is_empty()) {
        builder = builder.header(SERVER_TIMING_HEADER_NAME, server_timing.to_string());
    }
    Ok(builder.body(full(serde_json::to_vec(body)?))?)
}

pub fn full<T: Into<Bytes>>(chunk: T) -> ResponseBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty() -> ResponseBody {
    full(Bytes::new())
}
