use std::fmt;

use crate::http::headers::Headers;

/// HTTP status codes written on the status line.
///
/// The named variants carry a reason phrase; any other code can be sent via
/// `Other` and is rendered with an empty reason phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 500 Internal Server Error
    InternalServerError,
    /// Any other numeric code
    Other(u16),
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use rawhttp::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::Other(299).as_u16(), 299);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::InternalServerError => 500,
            StatusCode::Other(code) => *code,
        }
    }

    /// Returns the reason phrase, empty for codes without a fixed one.
    ///
    /// # Example
    ///
    /// ```
    /// # use rawhttp::http::response::StatusCode;
    /// assert_eq!(StatusCode::BadRequest.reason_phrase(), "Bad Request");
    /// assert_eq!(StatusCode::Other(418).reason_phrase(), "");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::Other(_) => "",
        }
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        match code {
            200 => StatusCode::Ok,
            400 => StatusCode::BadRequest,
            500 => StatusCode::InternalServerError,
            other => StatusCode::Other(other),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

/// Baseline response headers for a fixed-length plain text body.
///
/// Every response closes the connection. Callers adjust the table before
/// writing it, e.g. swapping `content-type` or dropping `content-length` in
/// favour of chunked transfer encoding.
pub fn get_default_headers(content_length: usize) -> Headers {
    let mut headers = Headers::new();
    headers.set("content-length", &content_length.to_string());
    headers.set("connection", "close");
    headers.set("content-type", "text/plain");
    headers
}
