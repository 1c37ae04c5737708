use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::headers::find_crlf;
use crate::http::request::{Request, RequestLine};

/// Starting capacity of the read buffer; it doubles whenever it fills up.
const INITIAL_BUFFER_SIZE: usize = 1024;

const SUPPORTED_VERSION: &str = "1.1";

/// Structural failures while reading a request off the wire.
///
/// Every variant is fatal to the connection that produced it. The `Display`
/// text is what the client receives as the body of the 500 response.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("poorly formatted request-line: {0}")]
    MalformedRequestLine(String),

    #[error("malformed method: {0}")]
    InvalidMethod(String),

    #[error("unrecognized HTTP-version: {0}")]
    UnsupportedVersion(String),

    #[error("malformed header line: {0}")]
    MalformedHeaderLine(String),

    #[error("invalid character {ch:?} (byte 0x{byte:02x}) in header key: {key}")]
    InvalidHeaderKey { ch: char, byte: u8, key: String },

    #[error("invalid content-length: {0}")]
    InvalidContentLength(String),

    #[error("body exceeds declared content-length ({received} > {declared})")]
    BodyTooLong { declared: usize, received: usize },

    #[error("incomplete request")]
    Incomplete,

    #[error("parsing after completion")]
    AlreadyDone,

    #[error("read error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Transport failures are not the client's fault and get no response.
    pub fn is_transport(&self) -> bool {
        matches!(self, ParseError::Io(_))
    }
}

/// Reads one complete request from `reader`.
///
/// Bytes may arrive in arbitrarily small pieces. After every read the buffer
/// is offered to the request state machine and whatever it consumed is
/// dropped from the front, so only the unparsed tail is kept around. Hitting
/// end of stream before the request is complete is an error.
pub async fn request_from_reader<R>(reader: &mut R) -> Result<Request, ParseError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = BytesMut::with_capacity(INITIAL_BUFFER_SIZE);
    let mut request = Request::new();

    while !request.is_done() {
        if buffer.len() == buffer.capacity() {
            let grow_by = buffer.capacity().max(INITIAL_BUFFER_SIZE);
            buffer.reserve(grow_by);
        }

        let n = reader.read_buf(&mut buffer).await?;
        if n == 0 {
            return Err(ParseError::Incomplete);
        }

        let consumed = request.parse(&buffer)?;
        buffer.advance(consumed);
    }

    Ok(request)
}

/// Parses the request line at the front of `data`.
///
/// Returns `None` while no full line is buffered, otherwise the parsed line
/// and the number of bytes it occupied including the CRLF.
pub fn parse_request_line(data: &[u8]) -> Result<Option<(RequestLine, usize)>, ParseError> {
    let Some(line_end) = find_crlf(data) else {
        return Ok(None);
    };

    // The target is not validated, so stray bytes survive as replacement chars.
    let line = String::from_utf8_lossy(&data[..line_end]);

    let request_line = request_line_from_str(&line)?;
    Ok(Some((request_line, line_end + 2)))
}

fn request_line_from_str(line: &str) -> Result<RequestLine, ParseError> {
    let parts: Vec<&str> = line.split(' ').collect();
    let &[method, target, version] = parts.as_slice() else {
        return Err(ParseError::MalformedRequestLine(line.to_string()));
    };

    if !is_valid_method(method) {
        return Err(ParseError::InvalidMethod(method.to_string()));
    }

    let (protocol, number) = version
        .split_once('/')
        .filter(|(_, rest)| !rest.contains('/'))
        .ok_or_else(|| ParseError::MalformedRequestLine(line.to_string()))?;

    if protocol != "HTTP" {
        return Err(ParseError::UnsupportedVersion(protocol.to_string()));
    }
    if number != SUPPORTED_VERSION {
        return Err(ParseError::UnsupportedVersion(number.to_string()));
    }

    Ok(RequestLine {
        method: method.to_string(),
        target: target.to_string(),
        http_version: number.to_string(),
    })
}

// Only lowercase letters disqualify a method; digits and symbols pass.
fn is_valid_method(method: &str) -> bool {
    !method.chars().any(|c| c.is_alphabetic() && !c.is_uppercase())
}
