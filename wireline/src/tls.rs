//! Layered TLS transport.
//!
//! [`Transport`] composes over the byte stream: ciphertext from the wire
//! goes in through [`on_receive`](Transport::on_receive), plaintext the
//! application wants to send goes in through [`write`](Transport::write),
//! and whatever has to reach the peer (handshake records, encrypted data,
//! alerts) comes back out of [`take_output`](Transport::take_output).
//! The handshake is a pre-phase: the `Connected` event is surfaced only
//! once it completes, so the layers above need not know whether a
//! connection is plain or TLS.

use std::io::{self, Read as _, Write as _};
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConnection, ServerConnection};
use tracing::debug;

use crate::error::Error;

/// Where a TLS session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Handshake records still in flight.
    Handshaking,
    /// Application data may flow.
    Established,
    /// close_notify sent or received.
    Closing,
}

/// What feeding bytes into the transport produced, beyond plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// Nothing notable; keep feeding.
    Continue,
    /// The handshake just completed. Surface `on_connect` now.
    Connected,
    /// The peer closed the session cleanly.
    Closed,
}

/// Information about a negotiated TLS session.
pub struct TlsInfo {
    pub protocol_version: Option<rustls::ProtocolVersion>,
    pub cipher_suite: Option<rustls::SupportedCipherSuite>,
    pub alpn_protocol: Option<Vec<u8>>,
    pub sni_hostname: Option<String>,
}

/// TLS session kind — server (inbound) or client (outbound).
enum SessionKind {
    Server(ServerConnection),
    Client(ClientConnection),
}

impl SessionKind {
    fn read_tls(&mut self, rd: &mut dyn io::Read) -> io::Result<usize> {
        match self {
            SessionKind::Server(c) => c.read_tls(rd),
            SessionKind::Client(c) => c.read_tls(rd),
        }
    }

    fn write_tls(&mut self, wr: &mut dyn io::Write) -> io::Result<usize> {
        match self {
            SessionKind::Server(c) => c.write_tls(wr),
            SessionKind::Client(c) => c.write_tls(wr),
        }
    }

    fn process_new_packets(&mut self) -> Result<rustls::IoState, rustls::Error> {
        match self {
            SessionKind::Server(c) => c.process_new_packets(),
            SessionKind::Client(c) => c.process_new_packets(),
        }
    }

    fn reader(&mut self) -> rustls::Reader<'_> {
        match self {
            SessionKind::Server(c) => c.reader(),
            SessionKind::Client(c) => c.reader(),
        }
    }

    fn writer(&mut self) -> rustls::Writer<'_> {
        match self {
            SessionKind::Server(c) => c.writer(),
            SessionKind::Client(c) => c.writer(),
        }
    }

    fn wants_write(&self) -> bool {
        match self {
            SessionKind::Server(c) => c.wants_write(),
            SessionKind::Client(c) => c.wants_write(),
        }
    }

    fn is_handshaking(&self) -> bool {
        match self {
            SessionKind::Server(c) => c.is_handshaking(),
            SessionKind::Client(c) => c.is_handshaking(),
        }
    }

    fn send_close_notify(&mut self) {
        match self {
            SessionKind::Server(c) => c.send_close_notify(),
            SessionKind::Client(c) => c.send_close_notify(),
        }
    }

    fn alpn_protocol(&self) -> Option<&[u8]> {
        match self {
            SessionKind::Server(c) => c.alpn_protocol(),
            SessionKind::Client(c) => c.alpn_protocol(),
        }
    }

    fn negotiated_cipher_suite(&self) -> Option<rustls::SupportedCipherSuite> {
        match self {
            SessionKind::Server(c) => c.negotiated_cipher_suite(),
            SessionKind::Client(c) => c.negotiated_cipher_suite(),
        }
    }

    fn protocol_version(&self) -> Option<rustls::ProtocolVersion> {
        match self {
            SessionKind::Server(c) => c.protocol_version(),
            SessionKind::Client(c) => c.protocol_version(),
        }
    }

    fn sni_hostname(&self) -> Option<&str> {
        match self {
            SessionKind::Server(c) => c.server_name(),
            SessionKind::Client(_) => None,
        }
    }
}

/// One TLS session with its ciphertext output queue.
pub struct TlsSession {
    conn: SessionKind,
    phase: Phase,
    out: Vec<u8>,
    scratch: Vec<u8>,
}

impl TlsSession {
    fn feed(&mut self, data: &[u8], plaintext: &mut Vec<u8>) -> Result<TransportEvent, Error> {
        let was_handshaking = self.conn.is_handshaking();

        let mut cursor = io::Cursor::new(data);
        self.conn.read_tls(&mut cursor)?;

        let state = match self.conn.process_new_packets() {
            Ok(state) => state,
            Err(e) => {
                // Flush the alert before reporting; the peer deserves to
                // know why the connection is about to vanish.
                self.flush_output();
                debug!("TLS error: {e}");
                return Err(Error::Tls(e));
            }
        };

        if state.plaintext_bytes_to_read() > 0 {
            let mut reader = self.conn.reader();
            loop {
                match reader.read(self.scratch.as_mut_slice()) {
                    Ok(0) => break,
                    Ok(n) => plaintext.extend_from_slice(&self.scratch[..n]),
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(_) => break,
                }
            }
        }

        self.flush_output();

        if was_handshaking && !self.conn.is_handshaking() {
            self.phase = Phase::Established;
            return Ok(TransportEvent::Connected);
        }

        if state.peer_has_closed() {
            self.phase = Phase::Closing;
            return Ok(TransportEvent::Closed);
        }

        Ok(TransportEvent::Continue)
    }

    /// Move pending ciphertext (handshake records, data, alerts) to `out`.
    fn flush_output(&mut self) {
        while self.conn.wants_write() {
            if self.conn.write_tls(&mut self.out).is_err() {
                break;
            }
        }
    }
}

/// A connection transport: plain bytes, or a TLS session layered on top.
///
/// Once `Connected` has been surfaced, both variants behave identically
/// from above: `write` plaintext in, `take_output` wire bytes out.
pub enum Transport {
    Plain { out: Vec<u8> },
    Tls(Box<TlsSession>),
}

impl Transport {
    /// A plaintext transport. Established from the start.
    pub fn plain() -> Self {
        Transport::Plain { out: Vec::new() }
    }

    /// A server-side TLS transport awaiting a ClientHello.
    pub fn server(config: Arc<rustls::ServerConfig>) -> Result<Self, Error> {
        let conn = ServerConnection::new(config)?;
        Ok(Transport::Tls(Box::new(TlsSession {
            conn: SessionKind::Server(conn),
            phase: Phase::Handshaking,
            out: Vec::new(),
            scratch: vec![0u8; 16384],
        })))
    }

    /// A client-side TLS transport. The ClientHello is queued immediately;
    /// drain it with [`take_output`](Self::take_output).
    pub fn client(
        config: Arc<rustls::ClientConfig>,
        server_name: ServerName<'static>,
    ) -> Result<Self, Error> {
        let conn = ClientConnection::new(config, server_name)?;
        let mut session = TlsSession {
            conn: SessionKind::Client(conn),
            phase: Phase::Handshaking,
            out: Vec::new(),
            scratch: vec![0u8; 16384],
        };
        session.flush_output();
        Ok(Transport::Tls(Box::new(session)))
    }

    /// Feed wire bytes in. Decrypted plaintext is appended to `plaintext`;
    /// the returned event reports handshake completion or session close.
    pub fn on_receive(
        &mut self,
        data: &[u8],
        plaintext: &mut Vec<u8>,
    ) -> Result<TransportEvent, Error> {
        match self {
            Transport::Plain { .. } => {
                plaintext.extend_from_slice(data);
                Ok(TransportEvent::Continue)
            }
            Transport::Tls(session) => session.feed(data, plaintext),
        }
    }

    /// Queue plaintext for the peer.
    pub fn write(&mut self, plaintext: &[u8]) -> Result<(), Error> {
        match self {
            Transport::Plain { out } => {
                out.extend_from_slice(plaintext);
                Ok(())
            }
            Transport::Tls(session) => {
                session.conn.writer().write_all(plaintext).map_err(Error::Io)?;
                session.flush_output();
                Ok(())
            }
        }
    }

    /// Drain the wire bytes queued for the peer.
    pub fn take_output(&mut self) -> Vec<u8> {
        match self {
            Transport::Plain { out } => std::mem::take(out),
            Transport::Tls(session) => std::mem::take(&mut session.out),
        }
    }

    /// Whether wire bytes are queued.
    pub fn has_output(&self) -> bool {
        match self {
            Transport::Plain { out } => !out.is_empty(),
            Transport::Tls(session) => !session.out.is_empty(),
        }
    }

    /// Begin closing. For TLS this queues a close_notify alert.
    pub fn close(&mut self) {
        if let Transport::Tls(session) = self {
            session.conn.send_close_notify();
            session.flush_output();
            session.phase = Phase::Closing;
        }
    }

    /// Session phase. Plain transports are always established.
    pub fn phase(&self) -> Phase {
        match self {
            Transport::Plain { .. } => Phase::Established,
            Transport::Tls(session) => session.phase,
        }
    }

    /// Negotiated session details, for TLS transports after the handshake.
    pub fn info(&self) -> Option<TlsInfo> {
        match self {
            Transport::Plain { .. } => None,
            Transport::Tls(session) => Some(TlsInfo {
                protocol_version: session.conn.protocol_version(),
                cipher_suite: session.conn.negotiated_cipher_suite(),
                alpn_protocol: session.conn.alpn_protocol().map(|p| p.to_vec()),
                sni_hostname: session.conn.sni_hostname().map(|s| s.to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_passes_bytes_through() {
        let mut t = Transport::plain();
        assert_eq!(t.phase(), Phase::Established);

        let mut plaintext = Vec::new();
        let event = t.on_receive(b"abc", &mut plaintext).unwrap();
        assert_eq!(event, TransportEvent::Continue);
        assert_eq!(plaintext, b"abc");

        t.write(b"xyz").unwrap();
        assert!(t.has_output());
        assert_eq!(t.take_output(), b"xyz");
        assert!(!t.has_output());
    }

    #[test]
    fn plain_close_is_silent() {
        let mut t = Transport::plain();
        t.close();
        assert!(!t.has_output());
        assert!(t.info().is_none());
    }
}
