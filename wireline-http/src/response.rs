//! Response building and serialization.
//!
//! A [`Response`] passes through `Open → HeaderSent → Closed`. While open,
//! status, headers, and cookies may change freely; the moment the header
//! block is written they are frozen, and mutators become inert so nothing
//! can contradict what is already on the wire.

use std::io;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use thiserror::Error;
use tracing::debug;
use wireline::Config;

use crate::date;
use crate::mime;
use crate::status;

/// File-response failures, carrying a POSIX-like code for handlers that
/// want to report errno-style.
#[derive(Debug, Error)]
pub enum FileError {
    /// No such file beneath the document root.
    #[error("file not found")]
    NotFound,
    /// The resolved path escapes the document root, or is not a regular file.
    #[error("path escapes document root")]
    Forbidden,
    /// The file existed but could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FileError {
    /// POSIX-style error code: ENOENT, EACCES, or EIO.
    pub fn code(&self) -> i32 {
        match self {
            FileError::NotFound => 2,
            FileError::Forbidden => 13,
            FileError::Io(_) => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    HeaderSent,
    Closed,
}

struct ResponseCookie {
    value: String,
    options: Vec<(String, String)>,
}

/// Mutable response builder bound to one request.
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, ResponseCookie)>,
    state: State,
    keep_alive: bool,
    request_keep_alive: bool,
    out: Vec<u8>,
    config: Arc<Config>,
}

impl Response {
    pub(crate) fn new(config: Arc<Config>) -> Self {
        Response {
            status: 200,
            headers: Vec::new(),
            cookies: Vec::new(),
            state: State::Open,
            keep_alive: true,
            request_keep_alive: false,
            out: Vec::new(),
            config,
        }
    }

    pub(crate) fn set_request_keep_alive(&mut self, keep_alive: bool) {
        self.request_keep_alive = keep_alive;
    }

    /// Set the status code. Inert once the header is sent.
    pub fn status(&mut self, code: u16) -> &mut Self {
        if self.state == State::Open {
            self.status = code;
        }
        self
    }

    /// The current status code.
    pub fn status_code(&self) -> u16 {
        self.status
    }

    /// Append a header. Duplicates accumulate; emission preserves
    /// insertion order. Inert once the header is sent.
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        if self.state == State::Open {
            self.headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    /// Set a cookie with `;`-separated attributes. An attribute with an
    /// empty value is emitted bare (`; HttpOnly`). Inert once the header
    /// is sent.
    pub fn set_cookie(&mut self, name: &str, value: &str, options: &[(&str, &str)]) -> &mut Self {
        if self.state == State::Open {
            self.cookies.push((
                name.to_string(),
                ResponseCookie {
                    value: value.to_string(),
                    options: options
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                },
            ));
        }
        self
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Send a complete body. Defaults `Content-Type` to
    /// `application/octet-stream` and frames with `Content-Length`.
    pub fn send(&mut self, body: &[u8]) {
        if self.state != State::Open {
            return;
        }
        if !self.has_header("content-type") {
            self.set_header("Content-Type", "application/octet-stream");
        }
        self.set_header("Content-Length", &body.len().to_string());
        self.write_header();
        self.out.extend_from_slice(body);
        self.state = State::Closed;
    }

    /// Send a text body. Defaults `Content-Type` to
    /// `text/html; charset=utf-8`.
    pub fn send_text(&mut self, body: &str) {
        if self.state != State::Open {
            return;
        }
        if !self.has_header("content-type") {
            self.set_header("Content-Type", "text/html; charset=utf-8");
        }
        self.send(body.as_bytes());
    }

    /// Finish with a header-only response.
    pub fn end(&mut self) {
        if self.state != State::Open {
            return;
        }
        // 1xx and 204/304 responses carry no body framing at all.
        let bodyless = self.status < 200 || self.status == 204 || self.status == 304;
        if !bodyless {
            self.set_header("Content-Length", "0");
        }
        self.write_header();
        self.state = State::Closed;
    }

    /// Send a file from beneath the configured document root.
    ///
    /// The path is canonicalized and must stay under the root: escapes are
    /// a 403, missing files a 404. On success `Content-Type` comes from
    /// the extension, `Content-Length` from the file size, and
    /// `Last-Modified` from the modification time.
    pub fn send_file(&mut self, path: &str) -> Result<(), FileError> {
        if self.state != State::Open {
            return Ok(());
        }

        let root = match self.config.document_root.canonicalize() {
            Ok(root) => root,
            Err(e) => {
                debug!("document root unavailable: {e}");
                self.status(404).end();
                return Err(FileError::NotFound);
            }
        };

        let absolute = match root.join(path.trim_start_matches('/')).canonicalize() {
            Ok(p) => p,
            Err(_) => {
                self.status(404).end();
                return Err(FileError::NotFound);
            }
        };

        if !absolute.starts_with(&root) || !absolute.is_file() {
            self.status(403).end();
            return Err(FileError::Forbidden);
        }

        let metadata = match std::fs::metadata(&absolute) {
            Ok(m) => m,
            Err(e) => {
                self.status(500).end();
                return Err(FileError::Io(e));
            }
        };

        if !self.has_header("content-type") {
            self.set_header("Content-Type", mime::content_type(&absolute));
        }
        self.set_header("Content-Length", &metadata.len().to_string());
        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
        self.set_header("Last-Modified", &date::http_date(modified));

        let body = match std::fs::read(&absolute) {
            Ok(data) => data,
            Err(e) => {
                self.status(500).end();
                return Err(FileError::Io(e));
            }
        };

        self.write_header();
        self.out.extend_from_slice(&body);
        self.state = State::Closed;
        Ok(())
    }

    /// Serialize the status line, `Date`, defaulted headers, user headers,
    /// and cookies. Freezes the response metadata.
    fn write_header(&mut self) {
        let mut head = Vec::with_capacity(256);

        head.extend_from_slice(b"HTTP/1.1 ");
        head.extend_from_slice(self.status.to_string().as_bytes());
        head.push(b' ');
        head.extend_from_slice(status::reason(self.status).as_bytes());
        head.extend_from_slice(b"\r\n");

        head.extend_from_slice(b"Date: ");
        head.extend_from_slice(date::now().as_bytes());
        head.extend_from_slice(b"\r\n");

        if !self.has_header("connection") {
            let value = if self.request_keep_alive && self.config.keep_alive {
                "keep-alive"
            } else {
                "close"
            };
            head.extend_from_slice(b"Connection: ");
            head.extend_from_slice(value.as_bytes());
            head.extend_from_slice(b"\r\n");
            self.keep_alive = value == "keep-alive";
        } else {
            let value = self.header_value("connection").unwrap_or("close");
            self.keep_alive = !value.eq_ignore_ascii_case("close");
        }

        if !self.has_header("cache-control") {
            head.extend_from_slice(b"Cache-Control: public, max-age=0\r\n");
        }
        if !self.has_header("accept-ranges") {
            head.extend_from_slice(b"Accept-Ranges: bytes\r\n");
        }
        if !self.has_header("x-powered-by") {
            head.extend_from_slice(b"X-Powered-By: ");
            head.extend_from_slice(self.config.server_token.as_bytes());
            head.extend_from_slice(b"\r\n");
        }

        for (name, value) in &self.headers {
            head.extend_from_slice(name.as_bytes());
            head.extend_from_slice(b": ");
            head.extend_from_slice(value.as_bytes());
            head.extend_from_slice(b"\r\n");
        }

        for (name, cookie) in &self.cookies {
            head.extend_from_slice(b"Set-Cookie: ");
            head.extend_from_slice(name.as_bytes());
            head.push(b'=');
            head.extend_from_slice(cookie.value.as_bytes());
            for (opt, val) in &cookie.options {
                head.extend_from_slice(b"; ");
                head.extend_from_slice(opt.as_bytes());
                if !val.is_empty() {
                    head.push(b'=');
                    head.extend_from_slice(val.as_bytes());
                }
            }
            head.extend_from_slice(b"\r\n");
        }

        head.extend_from_slice(b"\r\n");

        self.out.extend_from_slice(&head);
        self.state = State::HeaderSent;
    }

    /// Whether the response is fully written.
    pub fn is_complete(&self) -> bool {
        self.state == State::Closed
    }

    /// Whether the header block has been serialized.
    pub fn header_sent(&self) -> bool {
        self.state != State::Open
    }

    /// The `Connection` semantics this response committed to on the wire.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Drain the serialized wire bytes produced so far.
    pub(crate) fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }

    pub(crate) fn has_output(&self) -> bool {
        !self.out.is_empty()
    }
}
