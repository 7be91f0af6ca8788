use crate::domain::ImageUpload;
use crate::multipart::FormError::{Malformed, MissingFilePart, NotMultipart, TooLarge};
use futures_util::TryStreamExt;
use http_body_util::BodyStream;
use hyper::body::{Body, Bytes};
use hyper::header::CONTENT_TYPE;
use hyper::HeaderMap;
use multer::{Constraints, Multipart, SizeLimit};
use std::error;
use std::fmt::{Display, Formatter};
use tracing::{debug, instrument};

/// Form field the image is expected under.
pub const FILE_FIELD: &str = "file";

#[derive(Debug)]
pub enum FormError {
    NotMultipart,
    MissingFilePart,
    TooLarge { limit: u64 },
    Malformed(multer::Error),
}

impl Display for FormError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NotMultipart => write!(f, "Request is not multipart/form-data."),
            MissingFilePart => write!(f, "No \"{FILE_FIELD}\" part in the form."),
            TooLarge { limit } => write!(f, "Upload exceeds {limit} bytes."),
            Malformed(e) => write!(f, "Malformed multipart body: {e}"),
        }
    }
}

impl error::Error for FormError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Malformed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<multer::Error> for FormError {
    fn from(e: multer::Error) -> Self {
        match e {
            multer::Error::StreamSizeExceeded { limit }
            | multer::Error::FieldSizeExceeded { limit, .. } => TooLarge { limit },
            other => Malformed(other),
        }
    }
}

/// Pull the `file` part out of a multipart upload. Other parts are skipped.
#[instrument(skip_all)]
pub async fn read_upload<B>(
    headers: &HeaderMap,
    body: B,
    max_bytes: u64,
) -> Result<ImageUpload, FormError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn error::Error + Send + Sync>> + Send + 'static,
{
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .ok_or(NotMultipart)?;
    let boundary = multer::parse_boundary(content_type).map_err(|_| NotMultipart)?;

    let stream =
        BodyStream::new(body).try_filter_map(|frame| async move { Ok(frame.into_data().ok()) });
    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(max_bytes));
    let mut multipart = Multipart::with_constraints(stream, boundary, constraints);

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            debug!("Skipping form field {:?}", field.name());
            continue;
        }
        let filename = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(|mime| mime.to_string());
        let content = field.bytes().await?;

        debug!("Read {} bytes for {:?}", content.len(), filename);
        return Ok(ImageUpload {
            filename,
            content_type,
            content,
        });
    }
    Err(MissingFilePart)
}
