//! rawhttp - HTTP/1.1 over raw TCP
//!
//! Incremental request parsing, response writing with fixed or chunked
//! bodies, and a connection-per-task server.

pub mod config;
pub mod http;
pub mod server;
