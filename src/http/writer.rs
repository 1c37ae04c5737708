use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::headers::Headers;
use crate::http::response::StatusCode;

const HTTP_VERSION: &str = "HTTP/1.1";
const CRLF: &[u8] = b"\r\n";

/// Writes the pieces of a response straight onto a sink.
///
/// Nothing is buffered between calls. The caller sequences the calls:
/// status line, headers, then either `write_body` or a run of
/// `write_chunked_body` calls closed by `write_chunked_body_done` and an
/// optional `write_trailers`.
pub struct ResponseWriter<W> {
    sink: W,
    written: usize,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(sink: W) -> Self {
        Self { sink, written: 0 }
    }

    /// Total bytes put on the wire so far.
    pub fn bytes_written(&self) -> usize {
        self.written
    }

    /// Whether any part of the response has been emitted yet.
    pub fn has_written(&self) -> bool {
        self.written > 0
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    pub async fn write_status_line(&mut self, status: StatusCode) -> std::io::Result<()> {
        let line = format!(
            "{} {} {}\r\n",
            HTTP_VERSION,
            status.as_u16(),
            status.reason_phrase()
        );
        self.write_raw(line.as_bytes()).await
    }

    /// Writes every header as `name: value` followed by the blank line that
    /// ends the header block.
    pub async fn write_headers(&mut self, headers: &Headers) -> std::io::Result<()> {
        let mut buf = Vec::new();
        for (k, v) in headers.iter() {
            push_field(&mut buf, k, v);
        }
        buf.extend_from_slice(CRLF);

        self.write_raw(&buf).await
    }

    /// Writes a fixed-length body verbatim. `content-length` must already
    /// have been sent with the matching value.
    pub async fn write_body(&mut self, body: &[u8]) -> std::io::Result<()> {
        self.write_raw(body).await
    }

    /// Writes one chunk and returns the number of bytes it took on the wire.
    ///
    /// An empty chunk terminates the body, so use
    /// [`write_chunked_body_done`](Self::write_chunked_body_done) for that.
    pub async fn write_chunked_body(&mut self, chunk: &[u8]) -> std::io::Result<usize> {
        let before = self.written;

        let size_line = format!("{:x}\r\n", chunk.len());
        self.write_raw(size_line.as_bytes()).await?;
        self.write_raw(chunk).await?;
        self.write_raw(CRLF).await?;

        Ok(self.written - before)
    }

    /// Writes the zero-length chunk marking the end of a chunked body.
    pub async fn write_chunked_body_done(&mut self) -> std::io::Result<()> {
        self.write_raw(b"0\r\n").await
    }

    /// Writes the trailer fields and the blank line that closes the message.
    ///
    /// Only meaningful right after `write_chunked_body_done`, and only when
    /// the response headers announced these names in a `trailer` field.
    /// With no trailers this still writes the closing blank line.
    pub async fn write_trailers<I, K, V>(&mut self, trailers: I) -> std::io::Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut buf = Vec::new();
        for (k, v) in trailers {
            push_field(&mut buf, k.as_ref(), v.as_ref());
        }
        buf.extend_from_slice(CRLF);

        self.write_raw(&buf).await
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.sink.write_all(bytes).await?;
        self.written += bytes.len();
        Ok(())
    }
}

fn push_field(buf: &mut Vec<u8>, name: &str, value: &str) {
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(CRLF);
}
