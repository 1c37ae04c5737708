use std::future::Future;

use thiserror::Error;
use tokio::io::AsyncWrite;

use crate::http::request::Request;
use crate::http::response::{get_default_headers, StatusCode};
use crate::http::writer::ResponseWriter;

/// Application logic invoked once per parsed request.
///
/// The handler owns the whole response: it must write the status line,
/// headers and body (fixed or chunked) through `writer`. The server adds
/// nothing on success. The sink is generic so handlers can be driven
/// against an in-memory buffer in tests.
pub trait Handler: Send + Sync + 'static {
    fn handle<W>(
        &self,
        writer: &mut ResponseWriter<W>,
        request: &Request,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send
    where
        W: AsyncWrite + Unpin + Send;
}

/// A failure the handler wants reported to the client as a response.
///
/// If the handler returns this before writing anything, the connection
/// writes a plain text response with `status` and `message` on its behalf.
#[derive(Debug, Clone, Error)]
#[error("{status}: {message}")]
pub struct HandlerError {
    pub status: StatusCode,
    pub message: String,
}

impl HandlerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InternalServerError, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BadRequest, message)
    }
}

/// Writes a complete plain text response describing `err`.
pub async fn write_handler_error<W>(
    writer: &mut ResponseWriter<W>,
    err: &HandlerError,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_status_line(err.status).await?;
    writer
        .write_headers(&get_default_headers(err.message.len()))
        .await?;
    writer.write_body(err.message.as_bytes()).await
}
