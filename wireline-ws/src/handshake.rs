//! Opening-handshake helpers (RFC 6455 Section 4).
//!
//! The HTTP side of the upgrade is the HTTP engine's business; what lives
//! here is the websocket-specific arithmetic: deriving the
//! `Sec-WebSocket-Accept` token and picking a subprotocol.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};

/// The protocol GUID appended to the client key before hashing.
pub const GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Derive the `Sec-WebSocket-Accept` value from the client's
/// `Sec-WebSocket-Key`: base64 of SHA-1 over key + GUID.
pub fn accept_key(sec_websocket_key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(sec_websocket_key.trim().as_bytes());
    sha1.update(GUID);
    STANDARD.encode(sha1.finalize())
}

/// Pick a subprotocol: the first name the client offered (comma-separated
/// `Sec-WebSocket-Protocol` value) that the server supports.
pub fn select_subprotocol(offered: &str, supported: &[&str]) -> Option<String> {
    offered
        .split(',')
        .map(str::trim)
        .find(|name| !name.is_empty() && supported.contains(name))
        .map(str::to_string)
}
