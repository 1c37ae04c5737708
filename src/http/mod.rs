//! HTTP/1.1 protocol implementation.
//!
//! # Architecture
//!
//! - **`headers`**: case-insensitive header table and line-at-a-time header parsing
//! - **`request`**: the request being assembled and its parsing state machine
//! - **`parser`**: request-line parsing, parse errors and the read loop that drives a request to completion
//! - **`response`**: status codes and default response headers
//! - **`writer`**: writes status line, headers, fixed or chunked bodies and trailers onto a sink
//! - **`connection`**: serves one request on one accepted connection
//!
//! # Request State Machine
//!
//! Bytes arrive in arbitrary pieces. Each step reports how many bytes it
//! consumed, possibly zero when it needs more input:
//!
//! ```text
//!        ┌─────────────────────┐
//!        │ AwaitingRequestLine │ ← Wait for `METHOD TARGET HTTP/1.1\r\n`
//!        └──────────┬──────────┘
//!                   │ Request line parsed
//!                   ▼
//!        ┌─────────────────────┐
//!        │   ParsingHeaders    │ ← One `Name: value\r\n` per step
//!        └──────────┬──────────┘
//!                   │ Blank line
//!                   ▼
//!        ┌─────────────────────┐
//!        │    ParsingBody      │ ← Append until content-length is reached
//!        └──────────┬──────────┘
//!                   │ No content-length, or body complete
//!                   ▼
//!        ┌─────────────────────┐
//!        │        Done         │
//!        └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use rawhttp::http::parser::request_from_reader;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:42069").await?;
//!     let (mut socket, _addr) = listener.accept().await?;
//!     let request = request_from_reader(&mut socket).await?;
//!     println!("{} {}", request.request_line.method, request.request_line.target);
//!     Ok(())
//! }
//! ```

pub mod headers;
pub mod request;
pub mod response;
pub mod parser;
pub mod connection;
pub mod writer;
