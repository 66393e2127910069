//! The parsed request value.

use bytes::BytesMut;

/// One HTTP/1.1 request, immutable once the parser marks it complete.
///
/// Header names arrive lowercased; headers, cookies, and query parameters
/// all preserve insertion order and keep duplicates.
#[derive(Debug, Default)]
pub struct Request {
    /// Lowercased method token.
    pub method: String,
    /// Percent-decoded target, without the query string.
    pub url: String,
    /// `url` stripped to its last segment's parent; `/` when empty.
    pub path: String,
    /// The version token as received, e.g. `HTTP/1.1`.
    pub version: String,
    /// Raw query string (text after the first `?`).
    pub query_string: String,
    /// Decoded query parameters, first-occurrence order, duplicates kept.
    pub queries: Vec<(String, String)>,
    /// Header multimap: lowercase name, insertion order.
    pub headers: Vec<(String, String)>,
    /// Cookie pairs, trimmed, insertion order.
    pub cookies: Vec<(String, String)>,
    /// Declared body length; 0 when no `Content-Length` was present.
    pub content_length: usize,
    /// Body bytes; exactly `content_length` long once parsed.
    pub body: BytesMut,
    /// Whether the connection may be reused after this request.
    pub keep_alive: bool,
}

impl Request {
    /// First value of a header, by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values of a header, in insertion order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// First value of a query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.queries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// A cookie's value.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Derive `keep_alive` from the version and `Connection` header:
    /// HTTP/1.1 defaults to keep-alive unless `Connection: close`; any
    /// other version needs an explicit `Connection: keep-alive`.
    pub(crate) fn derive_keep_alive(&mut self) {
        let connection = self.header("connection").unwrap_or("");
        self.keep_alive = if self.version.eq_ignore_ascii_case("HTTP/1.1") {
            !connection.eq_ignore_ascii_case("close")
        } else {
            connection.eq_ignore_ascii_case("keep-alive")
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_header(version: &str, name: &str, value: &str) -> Request {
        let mut req = Request {
            version: version.to_string(),
            ..Request::default()
        };
        req.headers.push((name.to_string(), value.to_string()));
        req.derive_keep_alive();
        req
    }

    #[test]
    fn http11_defaults_to_keep_alive() {
        let mut req = Request {
            version: "HTTP/1.1".to_string(),
            ..Request::default()
        };
        req.derive_keep_alive();
        assert!(req.keep_alive);
    }

    #[test]
    fn http11_close_wins() {
        let req = with_header("HTTP/1.1", "connection", "close");
        assert!(!req.keep_alive);
    }

    #[test]
    fn http10_requires_explicit_keep_alive() {
        let mut req = Request {
            version: "HTTP/1.0".to_string(),
            ..Request::default()
        };
        req.derive_keep_alive();
        assert!(!req.keep_alive);

        let req = with_header("HTTP/1.0", "connection", "Keep-Alive");
        assert!(req.keep_alive);
    }

    #[test]
    fn multimap_accessors() {
        let mut req = Request::default();
        req.headers.push(("accept".into(), "a".into()));
        req.headers.push(("accept".into(), "b".into()));
        req.queries.push(("k".into(), "1".into()));
        req.queries.push(("k".into(), "2".into()));
        req.cookies.push(("id".into(), "7".into()));

        assert_eq!(req.header("accept"), Some("a"));
        let all: Vec<_> = req.header_values("accept").collect();
        assert_eq!(all, vec!["a", "b"]);
        assert_eq!(req.query("k"), Some("1"));
        assert_eq!(req.cookie("id"), Some("7"));
        assert_eq!(req.header("missing"), None);
    }
}
