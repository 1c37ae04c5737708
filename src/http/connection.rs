use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::http::parser::{request_from_reader, ParseError};
use crate::http::request::Request;
use crate::http::response::StatusCode;
use crate::http::writer::ResponseWriter;
use crate::server::handler::{write_handler_error, Handler, HandlerError};

/// A single accepted connection, serving exactly one request.
pub struct Connection<S, H> {
    stream: S,
    handler: Arc<H>,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Rejecting(ParseError),
    Closed,
}

impl<S, H> Connection<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    H: Handler,
{
    pub fn new(stream: S, handler: Arc<H>) -> Self {
        Self {
            stream,
            handler,
            state: ConnectionState::Reading,
        }
    }

    /// Reads one request, answers it and shuts the stream down.
    ///
    /// Malformed requests are answered with a 500 carrying the parse error.
    /// Read and write failures abort the connection and are returned.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    self.state = match request_from_reader(&mut self.stream).await {
                        Ok(request) => ConnectionState::Processing(request),
                        Err(e) if e.is_transport() => {
                            return Err(anyhow::Error::new(e).context("reading request"));
                        }
                        Err(e) => ConnectionState::Rejecting(e),
                    };
                }

                ConnectionState::Processing(request) => {
                    self.dispatch(&request).await?;
                }

                ConnectionState::Rejecting(err) => {
                    warn!(error = %err, "Rejecting malformed request");
                    let mut writer = ResponseWriter::new(&mut self.stream);
                    let err = HandlerError::new(StatusCode::InternalServerError, err.to_string());
                    write_handler_error(&mut writer, &err).await?;
                }

                ConnectionState::Closed => {
                    if let Err(e) = self.stream.shutdown().await {
                        debug!(error = %e, "Shutdown after response failed");
                    }
                    break;
                }
            }
        }

        Ok(())
    }

    async fn dispatch(&mut self, request: &Request) -> anyhow::Result<()> {
        debug!(
            method = %request.request_line.method,
            target = %request.request_line.target,
            "Dispatching request"
        );

        let mut writer = ResponseWriter::new(&mut self.stream);
        let Err(err) = self.handler.handle(&mut writer, request).await else {
            return Ok(());
        };

        warn!(
            status = err.status.as_u16(),
            error = %err.message,
            target = %request.request_line.target,
            "Handler returned an error"
        );

        // A half-written response can't be replaced.
        if !writer.has_written() {
            write_handler_error(&mut writer, &err).await?;
        }
        Ok(())
    }
}
