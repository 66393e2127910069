//! WebSocket receiver for the wireline toolkit.
//!
//! RFC 6455 base framing without extensions, server side: the receiver
//! unmasks every client frame in place and reports message boundaries to
//! an observer; frames the server produces are never masked. The HTTP
//! engine performs the upgrade and hands the byte stream over; from then
//! on every inbound chunk goes to a [`FrameReceiver`].
//!
//! # Quick Start
//!
//! ```rust
//! use wireline_ws::{FrameReceiver, FrameSink};
//!
//! #[derive(Default)]
//! struct Collect(Vec<u8>, bool);
//!
//! impl FrameSink for Collect {
//!     fn on_message_start(&mut self, _opcode: u8) {}
//!     fn on_frame_data(&mut self, data: &[u8]) {
//!         self.0.extend_from_slice(data);
//!     }
//!     fn on_message_end(&mut self) {
//!         self.1 = true;
//!     }
//!     fn on_error(&mut self, _code: u16) {}
//! }
//!
//! // Masked "hello" from a client, key 01 02 03 04.
//! let mut wire = vec![0x81, 0x85, 0x01, 0x02, 0x03, 0x04, 0x69, 0x67, 0x6f, 0x68, 0x6e];
//!
//! let mut receiver = FrameReceiver::new();
//! let mut sink = Collect::default();
//! receiver.receive(&mut wire, &mut sink);
//! assert_eq!(sink.0, b"hello");
//! assert!(sink.1);
//! ```

pub mod frame;
pub mod handshake;
pub mod mask;
pub mod receiver;

/// Frame-head encoder for server frames and test vectors.
pub use frame::FrameHead;
/// Observer interface the receiver reports into.
pub use receiver::FrameSink;
/// Incremental frame receiver with in-place unmasking.
pub use receiver::FrameReceiver;
/// Opcode constants.
pub use frame::{
    OPCODE_BINARY, OPCODE_CLOSE, OPCODE_CONTINUATION, OPCODE_PING, OPCODE_PONG, OPCODE_TEXT,
};
/// Close codes reported by the receiver.
pub use frame::{CLOSE_LENGTH_OVERFLOW, CLOSE_PROTOCOL_ERROR};
