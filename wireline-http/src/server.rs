//! Per-connection HTTP/1.1 server engine.
//!
//! One [`ServerContext`] per connection. Inbound bytes go in through
//! [`receive`](ServerContext::receive); the parser populates a FIFO of
//! request contexts; when the front of the queue becomes ready the handler
//! is invoked with the request and its response builder. Responses leave
//! the connection in arrival order — pipelined requests never reorder —
//! and the next dispatch waits until the front response is complete.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use tracing::warn;
use wireline::{metrics, ByteStream, Config};

use crate::parser::{RequestParser, RequestSink};
use crate::request::Request;
use crate::response::Response;

/// The application side of the engine, supplied at construction.
///
/// `on_request_ready` runs when the front request is dispatchable; it is
/// never re-entered. `on_request_completed` runs after the response is
/// fully flushed, or once during teardown if the connection dies with the
/// request in flight.
pub trait RequestHandler {
    fn on_request_ready(&mut self, request: &Request, response: &mut Response);

    fn on_request_completed(&mut self, _request: &Request, _response: &Response) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    /// The parser is still filling this entry.
    Parsing,
    /// Parsed (or failed); waiting to reach the front and dispatch.
    Ready,
    /// The handler owns it; its response is not yet complete.
    Dispatched,
    /// Response complete; waiting to be retired.
    Complete,
}

struct RequestContext {
    request: Request,
    response: Response,
    state: EntryState,
    /// Parser failure status; 0 on success.
    status: u16,
    reason: String,
}

/// The parser's sink: owns the request queue so the parser can report
/// into it while the context borrows its other fields.
struct Pipeline {
    entries: VecDeque<RequestContext>,
    config: Arc<Config>,
}

impl RequestSink for Pipeline {
    fn begin(&mut self) {
        self.entries.push_back(RequestContext {
            request: Request::default(),
            response: Response::new(self.config.clone()),
            state: EntryState::Parsing,
            status: 0,
            reason: String::new(),
        });
    }

    fn request_line(
        &mut self,
        method: String,
        url: String,
        path: String,
        version: String,
        query_string: String,
        queries: Vec<(String, String)>,
    ) {
        if let Some(entry) = self.entries.back_mut() {
            entry.request.method = method;
            entry.request.url = url;
            entry.request.path = path;
            entry.request.version = version;
            entry.request.query_string = query_string;
            entry.request.queries = queries;
        }
    }

    fn headers(
        &mut self,
        headers: Vec<(String, String)>,
        cookies: Vec<(String, String)>,
        content_length: usize,
    ) {
        if let Some(entry) = self.entries.back_mut() {
            entry.request.headers = headers;
            entry.request.cookies = cookies;
            entry.request.content_length = content_length;
            entry.request.body.reserve(content_length);
            entry.request.derive_keep_alive();
            let keep_alive = entry.request.keep_alive;
            entry.response.set_request_keep_alive(keep_alive);
        }
    }

    fn body(&mut self, chunk: &[u8]) {
        if let Some(entry) = self.entries.back_mut() {
            entry.request.body.extend_from_slice(chunk);
        }
    }

    fn parsed(&mut self) {
        metrics::REQUESTS_PARSED.increment();
        if let Some(entry) = self.entries.back_mut() {
            entry.state = EntryState::Ready;
        }
    }

    fn error(&mut self, status: u16, reason: &str) {
        metrics::PARSE_ERRORS.increment();
        if let Some(entry) = self.entries.back_mut() {
            entry.status = status;
            entry.reason = reason.to_string();
            entry.state = EntryState::Ready;
        }
    }
}

/// Pipelined request/response engine for one connection.
pub struct ServerContext<H: RequestHandler> {
    parser: RequestParser,
    pipeline: Pipeline,
    handler: H,
    send_buf: Vec<u8>,
    terminated: bool,
    upgraded: bool,
}

impl<H: RequestHandler> ServerContext<H> {
    pub fn new(config: Arc<Config>, handler: H) -> Self {
        ServerContext {
            parser: RequestParser::new().with_max_header_bytes(config.max_header_size),
            pipeline: Pipeline {
                entries: VecDeque::new(),
                config,
            },
            handler,
            send_buf: Vec::new(),
            terminated: false,
            upgraded: false,
        }
    }

    /// Feed inbound bytes. Chunks may split anything anywhere.
    pub fn receive(&mut self, chunk: &[u8]) {
        if self.terminated || self.upgraded {
            return;
        }
        metrics::BYTES_RECEIVED.add(chunk.len() as u64);
        self.parser.parse(chunk, &mut self.pipeline);
        self.pump();
    }

    /// Advance the pipeline: dispatch ready requests, drain response
    /// bytes, retire completed entries. Re-run after writing to a
    /// deferred response.
    pub fn flush(&mut self) {
        self.pump();
    }

    fn pump(&mut self) {
        loop {
            let state = match self.pipeline.entries.front() {
                Some(entry) => entry.state,
                None => break,
            };

            match state {
                EntryState::Parsing => break,
                EntryState::Ready => {
                    let entry = self.pipeline.entries.front_mut().expect("front exists");
                    entry.state = EntryState::Dispatched;
                    if entry.status == 0 {
                        self.handler.on_request_ready(&entry.request, &mut entry.response);
                    } else {
                        // Malformed request: answer for the handler and
                        // make sure the connection cannot be reused.
                        entry.response.status(entry.status);
                        entry.response.set_header("Connection", "close");
                        let reason = entry.reason.clone();
                        entry.response.send_text(&reason);
                    }
                }
                EntryState::Dispatched => {
                    let entry = self.pipeline.entries.front_mut().expect("front exists");
                    if entry.response.has_output() {
                        self.send_buf.extend(entry.response.take_output());
                    }
                    if entry.response.is_complete() {
                        entry.state = EntryState::Complete;
                    } else {
                        break;
                    }
                }
                EntryState::Complete => {
                    let entry = self.pipeline.entries.pop_front().expect("front exists");
                    self.handler
                        .on_request_completed(&entry.request, &entry.response);

                    if entry.response.status_code() == 101 {
                        // The connection now speaks another protocol; the
                        // driver hands the byte stream over.
                        self.upgraded = true;
                        break;
                    }

                    if !(entry.request.keep_alive && entry.response.keep_alive()) {
                        self.terminate();
                        break;
                    }
                }
            }
        }
    }

    /// The application handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The application handler, mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// The front in-flight response, for handlers that defer completion.
    pub fn response_mut(&mut self) -> Option<&mut Response> {
        self.pipeline
            .entries
            .front_mut()
            .filter(|entry| entry.state == EntryState::Dispatched)
            .map(|entry| &mut entry.response)
    }

    /// Drain the bytes queued for the wire.
    pub fn take_pending_send(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.send_buf)
    }

    /// Whether bytes are queued for the wire.
    pub fn has_pending_send(&self) -> bool {
        !self.send_buf.is_empty()
    }

    /// Whether the connection should close once the queue drains.
    pub fn wants_close(&self) -> bool {
        self.terminated
    }

    /// Whether a completed 101 response handed this connection over.
    pub fn is_upgraded(&self) -> bool {
        self.upgraded
    }

    /// Drain queued output into a stream and close it if terminated.
    pub fn pump_into(&mut self, stream: &mut dyn ByteStream) {
        let out = self.take_pending_send();
        if !out.is_empty() {
            stream.enqueue(&out);
        }
        if self.terminated {
            stream.close();
        }
    }

    /// Read side failed. Peer resets are swallowed; anything else is
    /// logged and tears the connection down.
    pub fn on_read_error(&mut self, error: io::Error) {
        if error.kind() == io::ErrorKind::ConnectionReset {
            return;
        }
        warn!("connection read: {error}");
        self.reset();
        self.terminate();
    }

    /// Write side failed. Same policy as the read side.
    pub fn on_write_error(&mut self, error: io::Error) {
        if error.kind() == io::ErrorKind::ConnectionReset {
            return;
        }
        warn!("connection write: {error}");
        self.reset();
        self.terminate();
    }

    /// Abandon all queued work. If a request is in flight its completion
    /// hook still runs, exactly once. Idempotent.
    pub fn reset(&mut self) {
        self.parser.reset();
        if let Some(front) = self.pipeline.entries.front() {
            if front.state == EntryState::Dispatched {
                let entry = self.pipeline.entries.pop_front().expect("front exists");
                self.handler
                    .on_request_completed(&entry.request, &entry.response);
            }
        }
        self.pipeline.entries.clear();
    }

    /// Mark the connection for closing after the outbound queue drains.
    /// Idempotent.
    pub fn terminate(&mut self) {
        self.terminated = true;
    }
}

impl<H: RequestHandler> Drop for ServerContext<H> {
    fn drop(&mut self) {
        // Teardown mid-flight still releases application resources.
        if let Some(front) = self.pipeline.entries.front() {
            if front.state == EntryState::Dispatched {
                let entry = self.pipeline.entries.pop_front().expect("front exists");
                self.handler
                    .on_request_completed(&entry.request, &entry.response);
            }
        }
    }
}
