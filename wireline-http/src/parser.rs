//! Incremental HTTP/1.1 request parser.
//!
//! [`RequestParser`] consumes byte chunks of arbitrary size — a chunk may
//! split a line, a header value, or the body anywhere — and reports
//! boundary events to a [`RequestSink`]. Lines are scanned by a two-state
//! machine (READ/EOL) that ignores carriage returns outside the body,
//! accepts bare LF terminators, and folds header continuation lines
//! (leading SP/TAB) into the previous header.
//!
//! Errors are reported through the sink and are terminal for the current
//! request: the parser goes quiescent until [`reset`](RequestParser::reset).

/// Boundary events produced while parsing one request.
///
/// Calls arrive strictly in order: `begin`, `request_line`, `headers`,
/// zero or more `body`, then exactly one of `parsed` or `error`.
pub trait RequestSink {
    /// A new request is starting.
    fn begin(&mut self);

    /// The request line was read and decoded.
    fn request_line(
        &mut self,
        method: String,
        url: String,
        path: String,
        version: String,
        query_string: String,
        queries: Vec<(String, String)>,
    );

    /// The header block is complete.
    fn headers(
        &mut self,
        headers: Vec<(String, String)>,
        cookies: Vec<(String, String)>,
        content_length: usize,
    );

    /// A contiguous slice of body bytes.
    fn body(&mut self, chunk: &[u8]);

    /// The request is complete.
    fn parsed(&mut self);

    /// The request is malformed. Terminal for this request.
    fn error(&mut self, status: u16, reason: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    /// Waiting for the first byte of a request.
    Begin,
    /// Reading the request line.
    RequestLine,
    /// Reading header lines.
    Header,
    /// Reading exactly `content_length` body bytes.
    Body,
    /// Quiescent after a malformed request, until reset.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    /// Accumulating a line.
    Read,
    /// Saw the LF after a non-empty line; deciding between header
    /// termination, folding, and a fresh line.
    Eol,
}

const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1024;

/// Incremental request parser. One per connection; reusable across
/// requests on that connection.
pub struct RequestParser {
    request_state: RequestState,
    line_state: LineState,
    line: Vec<u8>,
    header_bytes: usize,
    max_header_bytes: usize,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    content_length: usize,
    body_read: usize,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        RequestParser {
            request_state: RequestState::Begin,
            line_state: LineState::Read,
            line: Vec::new(),
            header_bytes: 0,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            headers: Vec::new(),
            cookies: Vec::new(),
            content_length: 0,
            body_read: 0,
        }
    }

    /// Override the header-block size limit.
    pub fn with_max_header_bytes(mut self, bytes: usize) -> Self {
        self.max_header_bytes = bytes;
        self
    }

    /// Feed a chunk. Events are reported to `sink`; surplus bytes after a
    /// complete request are parsed as the next request (pipelining).
    pub fn parse(&mut self, chunk: &[u8], sink: &mut impl RequestSink) {
        let mut i = 0;

        while i < chunk.len() {
            match self.request_state {
                RequestState::Error => return,
                RequestState::Body => {
                    i += self.consume_body(&chunk[i..], sink);
                }
                _ => {
                    if self.request_state == RequestState::Begin {
                        self.request_state = RequestState::RequestLine;
                        sink.begin();
                    }

                    let ch = chunk[i];
                    i += 1;

                    // CR is ignored entirely outside the body.
                    if ch == b'\r' {
                        continue;
                    }

                    self.header_bytes += 1;
                    if self.header_bytes > self.max_header_bytes {
                        self.fail(sink, 400, "header block too large");
                        return;
                    }

                    match self.line_state {
                        LineState::Read => {
                            if ch == b'\n' {
                                if self.line.is_empty() {
                                    self.take_line(sink);
                                } else {
                                    self.line_state = LineState::Eol;
                                }
                            } else {
                                self.line.push(ch);
                            }
                        }
                        LineState::Eol => {
                            if ch == b'\n' {
                                // Two terminators in a row: the pending
                                // line, then the empty header terminator.
                                self.take_line(sink);
                                if self.in_header_section() {
                                    self.take_line(sink);
                                }
                            } else if ch == b' ' || ch == b'\t' {
                                // LWS folding: the previous header value
                                // continues on this line.
                                self.line.push(ch);
                            } else {
                                self.take_line(sink);
                                self.line.push(ch);
                            }
                            self.line_state = LineState::Read;
                        }
                    }
                }
            }
        }
    }

    /// Return the parser to its initial state, discarding any partial
    /// request. The only way out of the error state.
    pub fn reset(&mut self) {
        self.reset_request();
        self.request_state = RequestState::Begin;
    }

    fn in_header_section(&self) -> bool {
        matches!(
            self.request_state,
            RequestState::RequestLine | RequestState::Header
        )
    }

    /// Emit the accumulated line to the current section handler.
    fn take_line(&mut self, sink: &mut impl RequestSink) {
        let line = std::mem::take(&mut self.line);
        match self.request_state {
            RequestState::RequestLine => {
                if line.is_empty() {
                    self.fail(sink, 400, "empty request line");
                } else {
                    self.parse_request_line(&line, sink);
                }
            }
            RequestState::Header => {
                if line.is_empty() {
                    self.end_of_headers(sink);
                } else {
                    self.add_header(&line, sink);
                }
            }
            _ => {}
        }
    }

    fn parse_request_line(&mut self, line: &[u8], sink: &mut impl RequestSink) {
        let (method, rest) = split_once(line, b' ');
        let (target, version) = split_once(rest, b' ');

        let method = String::from_utf8_lossy(method).to_ascii_lowercase();
        let version = String::from_utf8_lossy(version).into_owned();

        let decoded = match percent_decode(target) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(()) => {
                self.fail(sink, 400, "malformed percent encoding in target");
                return;
            }
        };

        let (url, query_string) = match decoded.split_once('?') {
            Some((u, q)) => (u.to_string(), q.to_string()),
            None => (decoded, String::new()),
        };

        // The path is the target stripped to its last segment's parent.
        let path = match url.rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(idx) => url[..idx].to_string(),
        };

        let mut queries = Vec::new();
        for pair in query_string.split('&') {
            if pair.is_empty() {
                continue;
            }
            match pair.split_once('=') {
                Some((k, v)) => queries.push((k.to_string(), v.to_string())),
                None => queries.push((pair.to_string(), String::new())),
            }
        }

        sink.request_line(method, url, path, version, query_string, queries);
        self.request_state = RequestState::Header;
    }

    fn add_header(&mut self, line: &[u8], sink: &mut impl RequestSink) {
        let (name, value) = split_once(line, b':');
        let name = String::from_utf8_lossy(name).trim().to_ascii_lowercase();
        let value = String::from_utf8_lossy(value).trim().to_string();

        // Headers with empty values carry nothing; drop them.
        if value.is_empty() {
            return;
        }

        if name == "cookie" {
            for cookie in value.split(';') {
                let (ck, cv) = match cookie.split_once('=') {
                    Some((k, v)) => (k.trim(), v.trim()),
                    None => (cookie.trim(), ""),
                };
                if !ck.is_empty() {
                    self.cookies.push((ck.to_string(), cv.to_string()));
                }
            }
            return;
        }

        if name == "content-length" {
            match value.parse::<usize>() {
                Ok(n) => self.content_length = n,
                Err(_) => {
                    self.fail(sink, 400, "invalid content-length");
                    return;
                }
            }
        }

        self.headers.push((name, value));
    }

    fn end_of_headers(&mut self, sink: &mut impl RequestSink) {
        let headers = std::mem::take(&mut self.headers);
        let cookies = std::mem::take(&mut self.cookies);
        sink.headers(headers, cookies, self.content_length);

        if self.content_length > 0 {
            self.request_state = RequestState::Body;
        } else {
            sink.parsed();
            self.reset_request();
        }
    }

    fn consume_body(&mut self, chunk: &[u8], sink: &mut impl RequestSink) -> usize {
        let want = self.content_length - self.body_read;
        let take = want.min(chunk.len());
        if take > 0 {
            sink.body(&chunk[..take]);
            self.body_read += take;
        }

        if self.body_read == self.content_length {
            sink.parsed();
            self.reset_request();
        }

        take
    }

    fn fail(&mut self, sink: &mut impl RequestSink, status: u16, reason: &str) {
        sink.error(status, reason);
        self.request_state = RequestState::Error;
    }

    /// Clear per-request accumulation for the next pipelined request.
    fn reset_request(&mut self) {
        self.request_state = RequestState::Begin;
        self.line_state = LineState::Read;
        self.line.clear();
        self.header_bytes = 0;
        self.headers = Vec::new();
        self.cookies = Vec::new();
        self.content_length = 0;
        self.body_read = 0;
    }
}

/// Split at the first occurrence of `sep`. Without a separator the whole
/// input is the first half and the second half is empty.
fn split_once(input: &[u8], sep: u8) -> (&[u8], &[u8]) {
    match input.iter().position(|&b| b == sep) {
        Some(idx) => (&input[..idx], &input[idx + 1..]),
        None => (input, &input[input.len()..]),
    }
}

/// Percent-decode, with `+` as space. A truncated or non-hex escape is an
/// error.
fn percent_decode(input: &[u8]) -> Result<Vec<u8>, ()> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        match input[i] {
            b'%' => {
                if i + 3 > input.len() {
                    return Err(());
                }
                let hi = hex_val(input[i + 1]).ok_or(())?;
                let lo = hex_val(input[i + 2]).ok_or(())?;
                out.push((hi << 4) | lo);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Ok(out)
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every sink callback for assertion.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        body: Vec<u8>,
    }

    impl RequestSink for Recorder {
        fn begin(&mut self) {
            self.events.push("begin".into());
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
            let qs: Vec<String> = queries.iter().map(|(k, v)| format!("{k}={v}")).collect();
            self.events.push(format!(
                "line:{method} {url} {path} {version} ?{query_string} [{}]",
                qs.join(",")
            ));
        }

        fn headers(
            &mut self,
            headers: Vec<(String, String)>,
            cookies: Vec<(String, String)>,
            content_length: usize,
        ) {
            let hs: Vec<String> = headers.iter().map(|(k, v)| format!("{k}={v}")).collect();
            let cs: Vec<String> = cookies.iter().map(|(k, v)| format!("{k}={v}")).collect();
            self.events
                .push(format!("headers:[{}] cookies:[{}] len:{content_length}", hs.join(","), cs.join(",")));
        }

        fn body(&mut self, chunk: &[u8]) {
            self.body.extend_from_slice(chunk);
        }

        fn parsed(&mut self) {
            self.events.push(format!("parsed body:{}", self.body.len()));
        }

        fn error(&mut self, status: u16, reason: &str) {
            self.events.push(format!("error:{status}:{reason}"));
        }
    }

    fn run(input: &[u8]) -> Recorder {
        let mut parser = RequestParser::new();
        let mut sink = Recorder::default();
        parser.parse(input, &mut sink);
        sink
    }

    #[test]
    fn minimal_get() {
        let sink = run(b"GET /a?x=1&y=2 HTTP/1.1\r\nHost: h\r\n\r\n");
        assert_eq!(
            sink.events,
            vec![
                "begin",
                "line:get /a / HTTP/1.1 ?x=1&y=2 [x=1,y=2]",
                "headers:[host=h] cookies:[] len:0",
                "parsed body:0",
            ]
        );
    }

    #[test]
    fn bare_lf_terminators() {
        let sink = run(b"GET / HTTP/1.1\nHost: h\n\n");
        assert_eq!(sink.events.last().unwrap(), "parsed body:0");
    }

    #[test]
    fn fragmentation_invariance_byte_at_a_time() {
        let input = b"POST /p?a=1 HTTP/1.1\r\nHost: h\r\nContent-Length: 5\r\n\r\nhello";

        let whole = run(input);

        let mut parser = RequestParser::new();
        let mut sink = Recorder::default();
        for b in input.iter() {
            parser.parse(std::slice::from_ref(b), &mut sink);
        }

        assert_eq!(whole.events, sink.events);
        assert_eq!(whole.body, sink.body);
        assert_eq!(sink.body, b"hello");
    }

    #[test]
    fn fragmentation_invariance_all_split_points() {
        let input = b"GET /x/y?k=v&k=w HTTP/1.1\r\nHost: h\r\nCookie: a=1; b=2\r\n\r\n";
        let whole = run(input);

        for split in 1..input.len() {
            let mut parser = RequestParser::new();
            let mut sink = Recorder::default();
            parser.parse(&input[..split], &mut sink);
            parser.parse(&input[split..], &mut sink);
            assert_eq!(whole.events, sink.events, "split at {split}");
        }
    }

    #[test]
    fn body_with_content_length() {
        let sink = run(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");
        assert_eq!(sink.body, b"hello");
        assert_eq!(sink.events.last().unwrap(), "parsed body:5");
    }

    #[test]
    fn pipelined_requests_share_a_chunk() {
        let sink = run(b"GET /a HTTP/1.1\r\nHost: h\r\n\r\nGET /b HTTP/1.1\r\nHost: h\r\n\r\n");
        let parsed: Vec<_> = sink.events.iter().filter(|e| e.starts_with("parsed")).collect();
        let begins: Vec<_> = sink.events.iter().filter(|e| *e == "begin").collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(begins.len(), 2);
    }

    #[test]
    fn surplus_body_bytes_start_next_request() {
        let input =
            b"POST / HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET /n HTTP/1.1\r\nHost: h\r\n\r\n";
        let sink = run(input);
        assert_eq!(sink.body, b"abc");
        assert!(sink.events.iter().any(|e| e.contains("line:get /n")));
    }

    #[test]
    fn empty_request_line_is_400() {
        let sink = run(b"\r\n");
        assert_eq!(sink.events, vec!["begin", "error:400:empty request line"]);
    }

    #[test]
    fn error_state_is_quiescent_until_reset() {
        let mut parser = RequestParser::new();
        let mut sink = Recorder::default();
        parser.parse(b"\r\nGET / HTTP/1.1\r\n\r\n", &mut sink);
        // Nothing after the error.
        assert_eq!(sink.events, vec!["begin", "error:400:empty request line"]);

        parser.reset();
        parser.parse(b"GET / HTTP/1.1\r\nHost: h\r\n\r\n", &mut sink);
        assert_eq!(sink.events.last().unwrap(), "parsed body:0");
    }

    #[test]
    fn invalid_content_length_is_400() {
        let sink = run(b"POST / HTTP/1.1\r\nContent-Length: five\r\n\r\n");
        assert!(sink
            .events
            .iter()
            .any(|e| e == "error:400:invalid content-length"));
    }

    #[test]
    fn bad_percent_escape_is_400() {
        let sink = run(b"GET /a%zz HTTP/1.1\r\n\r\n");
        assert!(sink.events.iter().any(|e| e.starts_with("error:400")));

        let sink = run(b"GET /a%2 HTTP/1.1\r\n\r\n");
        assert!(sink.events.iter().any(|e| e.starts_with("error:400")));
    }

    #[test]
    fn percent_decoding_and_plus() {
        let sink = run(b"GET /a%20b+c?q=1 HTTP/1.1\r\n\r\n");
        assert!(sink.events.iter().any(|e| e.contains("line:get /a b c /")));
    }

    #[test]
    fn lws_folding_continues_header() {
        let sink = run(b"GET / HTTP/1.1\r\nX-Long: first\r\n second\r\n\r\n");
        assert!(sink
            .events
            .iter()
            .any(|e| e.contains("x-long=first  second") || e.contains("x-long=first second")));
    }

    #[test]
    fn cookies_split_and_trimmed() {
        let sink = run(b"GET / HTTP/1.1\r\nCookie: id=7; theme=dark ; lang=en\r\n\r\n");
        assert!(sink
            .events
            .iter()
            .any(|e| e.contains("cookies:[id=7,theme=dark,lang=en]")));
    }

    #[test]
    fn duplicate_headers_accumulate() {
        let sink = run(b"GET / HTTP/1.1\r\nAccept: a\r\nAccept: b\r\n\r\n");
        assert!(sink
            .events
            .iter()
            .any(|e| e.contains("headers:[accept=a,accept=b]")));
    }

    #[test]
    fn duplicate_query_keys_kept_in_order() {
        let sink = run(b"GET /?k=1&k=2&j=3 HTTP/1.1\r\n\r\n");
        assert!(sink.events.iter().any(|e| e.contains("[k=1,k=2,j=3]")));
    }

    #[test]
    fn path_strips_to_parent_segment() {
        let sink = run(b"GET /dir/file HTTP/1.1\r\n\r\n");
        assert!(sink.events.iter().any(|e| e.contains("line:get /dir/file /dir ")));

        let sink = run(b"GET / HTTP/1.1\r\n\r\n");
        assert!(sink.events.iter().any(|e| e.contains("line:get / / ")));
    }

    #[test]
    fn header_block_limit_enforced() {
        let mut parser = RequestParser::new().with_max_header_bytes(32);
        let mut sink = Recorder::default();
        parser.parse(b"GET / HTTP/1.1\r\nX-Pad: aaaaaaaaaaaaaaaaaaaaaaaaaaa\r\n\r\n", &mut sink);
        assert!(sink
            .events
            .iter()
            .any(|e| e == "error:400:header block too large"));
    }
}
