//! HTTP/1.1 server-side protocol engine for the wireline toolkit.
//!
//! Sans-IO: the engine never touches a socket. An external event loop
//! feeds inbound bytes to [`ServerContext::receive`], drains outbound
//! bytes from [`ServerContext::take_pending_send`], and closes the
//! connection when [`ServerContext::wants_close`] says so. In between,
//! the incremental parser turns arbitrarily-fragmented chunks into
//! requests, the pipeline dispatches them to the application handler in
//! wire order, and the response writer serializes replies.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use wireline::Config;
//! use wireline_http::{Request, RequestHandler, Response, ServerContext};
//!
//! struct Hello;
//!
//! impl RequestHandler for Hello {
//!     fn on_request_ready(&mut self, request: &Request, response: &mut Response) {
//!         response.send_text(&format!("<h1>{}</h1>", request.url));
//!     }
//! }
//!
//! let mut ctx = ServerContext::new(Arc::new(Config::default()), Hello);
//! ctx.receive(b"GET /hi HTTP/1.1\r\nHost: example\r\n\r\n");
//! let wire = ctx.take_pending_send();
//! assert!(wire.starts_with(b"HTTP/1.1 200 OK\r\n"));
//! ```
//!
//! # Pipelining
//!
//! Requests are queued in arrival order; the handler sees request *i+1*
//! only after the response for request *i* is complete, and response bytes
//! hit the wire in the same order. A malformed request produces a 400 with
//! `Connection: close` and terminates the connection after the flush — it
//! never deadlocks the queue.

pub mod date;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod server;
pub mod status;

/// The parsed request value.
pub use request::Request;
/// Observer interface the parser reports into.
pub use parser::RequestSink;
/// Incremental HTTP/1.1 request parser.
pub use parser::RequestParser;
/// File-response failures with POSIX-like codes.
pub use response::FileError;
/// Mutable response builder and wire writer.
pub use response::Response;
/// Application callbacks supplied at context construction.
pub use server::RequestHandler;
/// Pipelined per-connection engine.
pub use server::ServerContext;
