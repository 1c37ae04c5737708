use crate::http::headers::Headers;
use crate::http::parser::{parse_request_line, ParseError};

/// The first line of a request: `METHOD TARGET HTTP/VERSION`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLine {
    /// The method token (e.g. "GET")
    pub method: String,
    /// The request target exactly as sent (e.g. "/index.html?q=1")
    pub target: String,
    /// The version number without the `HTTP/` prefix, always "1.1"
    pub http_version: String,
}

/// Progress of a request through the parser.
///
/// States only ever move forward, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Waiting for a complete request line
    AwaitingRequestLine,
    /// Consuming header lines until the blank line
    ParsingHeaders,
    /// Accumulating the content-length delimited body
    ParsingBody,
    /// Fully parsed; no more input is accepted
    Done,
}

/// A request being assembled from wire bytes.
///
/// Created empty, fed buffer slices through [`Request::parse`] until it
/// reports [`RequestState::Done`], then handed to the handler read-only.
#[derive(Debug, Clone)]
pub struct Request {
    pub request_line: RequestLine,
    pub headers: Headers,
    pub body: Vec<u8>,
    state: RequestState,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    pub fn new() -> Self {
        Self {
            request_line: RequestLine::default(),
            headers: Headers::new(),
            body: Vec::new(),
            state: RequestState::AwaitingRequestLine,
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == RequestState::Done
    }

    /// Retrieves a header value by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Feeds `data` to the state machine and returns how many bytes of it
    /// were consumed.
    ///
    /// Steps are taken until the request is done or a step makes no
    /// progress, in which case the caller must come back with more bytes.
    /// Unconsumed bytes must be offered again on the next call.
    pub fn parse(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        if self.is_done() {
            return Err(ParseError::AlreadyDone);
        }

        let mut total = 0;
        while !self.is_done() {
            let before = self.state;
            let n = self.parse_single(&data[total..])?;
            total += n;

            if n == 0 && self.state == before {
                break;
            }
        }

        Ok(total)
    }

    /// Runs a single step for the current state and returns the bytes it
    /// consumed. Zero with an unchanged state means more input is needed.
    pub(crate) fn parse_single(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        match self.state {
            RequestState::AwaitingRequestLine => {
                let Some((request_line, n)) = parse_request_line(data)? else {
                    return Ok(0);
                };
                self.request_line = request_line;
                self.state = RequestState::ParsingHeaders;
                Ok(n)
            }

            RequestState::ParsingHeaders => {
                let (n, done) = self.headers.parse_one(data)?;
                if done {
                    self.state = RequestState::ParsingBody;
                }
                Ok(n)
            }

            RequestState::ParsingBody => {
                let Some(declared) = self.content_length()? else {
                    self.state = RequestState::Done;
                    return Ok(0);
                };

                // Body bytes are opaque, so whatever is offered is taken.
                self.body.extend_from_slice(data);

                if self.body.len() > declared {
                    return Err(ParseError::BodyTooLong {
                        declared,
                        received: self.body.len(),
                    });
                }
                if self.body.len() == declared {
                    self.state = RequestState::Done;
                }
                Ok(data.len())
            }

            RequestState::Done => Err(ParseError::AlreadyDone),
        }
    }

    /// The declared body length, if a `content-length` header was sent.
    pub fn content_length(&self) -> Result<Option<usize>, ParseError> {
        self.header("content-length")
            .map(|v| {
                v.parse::<usize>()
                    .map_err(|_| ParseError::InvalidContentLength(v.to_string()))
            })
            .transpose()
    }
}
