//! Builds 200/206 responses that stream a library file chunk by chunk.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::{
    chunks::ChunkStream,
    content_type::content_type_for,
    error::StreamError,
    range::{ByteRange, parse_range},
    resolver::MediaRoot,
};

/// Resolves `filename` under `root` and answers it, honoring `range` when
/// present.
///
/// All validation happens before the response exists, so those failures
/// turn into clean 400/404/416 answers. Once the headers are out, a failing
/// read can only abort the body: `Content-Length` is already committed and
/// the client sees a short response (players re-request with a new `Range`).
pub async fn stream_response(
    root: &MediaRoot,
    filename: &str,
    range: Option<&HeaderValue>,
    chunk_size: usize,
) -> Result<Response, StreamError> {
    let file = root.resolve(filename).await?;
    let size = file.size_bytes();

    let (status, byte_range) = match range {
        Some(value) => {
            let parsed = value
                .to_str()
                .ok()
                .and_then(|raw| parse_range(raw, size).ok())
                .ok_or(StreamError::RangeNotSatisfiable { size })?;
            (StatusCode::PARTIAL_CONTENT, Some(parsed))
        }
        None => (StatusCode::OK, ByteRange::full(size)),
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(file.extension())),
    );

    let Some(byte_range) = byte_range else {
        // Zero-length file without a Range header.
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(0u64));
        return Ok((status, headers, Body::empty()).into_response());
    };

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(byte_range.length()));
    if status == StatusCode::PARTIAL_CONTENT {
        headers.insert(
            header::CONTENT_RANGE,
            HeaderValue::try_from(byte_range.content_range())?,
        );
    }

    debug!(
        file = file.filename(),
        status = status.as_u16(),
        start = byte_range.start(),
        end = byte_range.end(),
        size,
        "streaming media file"
    );

    let chunks = ChunkStream::open(file.path(), byte_range, chunk_size)
        .await
        .map_err(|err| match err.kind() {
            // Deleted between resolving and opening.
            std::io::ErrorKind::NotFound => StreamError::NotFound,
            _ => StreamError::Io(err),
        })?;
    Ok((status, headers, Body::from_stream(chunks)).into_response())
}
