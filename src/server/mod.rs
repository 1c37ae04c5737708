//! TCP server plumbing.
//!
//! - **`listener`**: binds the socket, runs the accept loop and handles shutdown
//! - **`handler`**: the capability the application plugs into the server

pub mod handler;
pub mod listener;

pub use handler::{Handler, HandlerError};
pub use listener::Server;
