//! Abstract duplex byte channel.
//!
//! A connection, whatever transport it sits on, is a [`ByteStream`]: bytes
//! go out through `enqueue`, the stream half-closes through `close`, and the
//! event loop that owns the descriptor delivers inbound bytes and transport
//! errors to a [`StreamObserver`]. Protocol engines never see a file
//! descriptor and never block; they consume what they are given and return.
//!
//! [`MemoryStream`] is the in-memory implementation used by tests and by
//! anything that wants to drive a protocol engine without a socket.

use crate::metrics;

/// Outbound half of a duplex byte channel.
///
/// `enqueue` appends to the stream's write queue and never blocks; draining
/// the queue is the driver's job. `close` half-closes the write side after
/// the queue drains. Closing twice is a no-op.
pub trait ByteStream {
    /// Append bytes to the outbound queue.
    fn enqueue(&mut self, data: &[u8]);

    /// Half-close the write side once the outbound queue has drained.
    fn close(&mut self);

    /// Whether `close` has been requested.
    fn is_closed(&self) -> bool;
}

/// Callbacks delivered by the driver that owns the descriptor.
///
/// All callbacks run on the connection's thread and must return promptly;
/// there are no suspension points inside the core. Read/write timeouts are
/// enforced by the driver and surface here as errors.
pub trait StreamObserver {
    /// The connection is established (for TLS, after the handshake).
    fn on_connect(&mut self) {}

    /// A chunk of inbound bytes, of arbitrary size and alignment.
    fn on_receive(&mut self, chunk: &[u8]);

    /// The read side failed. A peer reset is delivered here too; observers
    /// decide whether to swallow it.
    fn on_read_error(&mut self, error: std::io::Error);

    /// The write side failed.
    fn on_write_error(&mut self, error: std::io::Error);

    /// The connection is gone. Always the last callback.
    fn on_disconnect(&mut self) {}
}

/// In-memory [`ByteStream`] backed by a `Vec`.
///
/// Collects everything enqueued on it so a test (or an embedding without a
/// real socket) can inspect the exact wire bytes a protocol engine produced.
#[derive(Debug, Default)]
pub struct MemoryStream {
    out: Vec<u8>,
    closed: bool,
}

impl MemoryStream {
    pub fn new() -> Self {
        metrics::CONNECTIONS_OPENED.increment();
        metrics::CONNECTIONS_ACTIVE.increment();
        MemoryStream::default()
    }

    /// Drain and return everything enqueued so far.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }

    /// Peek at the queued output without draining it.
    pub fn output(&self) -> &[u8] {
        &self.out
    }
}

impl ByteStream for MemoryStream {
    fn enqueue(&mut self, data: &[u8]) {
        metrics::BYTES_SENT.add(data.len() as u64);
        self.out.extend_from_slice(data);
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            metrics::CONNECTIONS_CLOSED.increment();
            metrics::CONNECTIONS_ACTIVE.decrement();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_accumulates_in_order() {
        let mut s = MemoryStream::new();
        s.enqueue(b"hello ");
        s.enqueue(b"world");
        assert_eq!(s.output(), b"hello world");
        assert_eq!(s.take_output(), b"hello world");
        assert!(s.output().is_empty());
    }

    #[test]
    fn close_is_idempotent() {
        let mut s = MemoryStream::new();
        assert!(!s.is_closed());
        s.close();
        s.close();
        assert!(s.is_closed());
    }
}
