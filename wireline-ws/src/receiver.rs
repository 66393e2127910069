//! Incremental WebSocket frame receiver.
//!
//! [`FrameReceiver`] consumes byte chunks of arbitrary size — one byte at
//! a time is fine — and reports message boundaries and payload slices to
//! a [`FrameSink`]. Masked payloads are unmasked in place, with the key
//! rotation carried across chunk boundaries, so the sink always sees
//! clear payload bytes.
//!
//! Fragmented messages arrive as a non-fin first frame followed by
//! continuation frames (opcode 0); the receiver tracks that state and
//! reports a single `on_message_start` / `on_message_end` pair around all
//! of them. A non-continuation opcode inside a fragmented message is a
//! protocol error (close code 1002); a 64-bit payload length with its top
//! bit set is an error too (close code 1004).

use tracing::debug;
use wireline::metrics;

use crate::frame::{CLOSE_LENGTH_OVERFLOW, CLOSE_PROTOCOL_ERROR, OPCODE_CONTINUATION};
use crate::mask;

/// Events produced while receiving frames.
pub trait FrameSink {
    /// A new message begins; `opcode` is the first frame's opcode.
    fn on_message_start(&mut self, opcode: u8);

    /// A contiguous slice of unmasked payload bytes.
    fn on_frame_data(&mut self, data: &[u8]);

    /// The fin frame of the message finished.
    fn on_message_end(&mut self);

    /// Protocol error with a close code. The receiver has reset itself;
    /// the caller should close the connection with `code`.
    fn on_error(&mut self, code: u16);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Begin,
    Opcode,
    Length,
    ELength,
    MaskingKey,
    Payload,
    Error,
}

/// RFC 6455 base-framing receiver. One per upgraded connection.
pub struct FrameReceiver {
    state: State,
    fin: bool,
    opcode: u8,
    masked: bool,
    length: u64,
    elength_left: u8,
    key: [u8; 4],
    key_left: u8,
    payload_read: u64,
    continuation: bool,
    error_code: u16,
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReceiver {
    pub fn new() -> Self {
        FrameReceiver {
            state: State::Begin,
            fin: false,
            opcode: 0,
            masked: false,
            length: 0,
            elength_left: 0,
            key: [0; 4],
            key_left: 0,
            payload_read: 0,
            continuation: false,
            error_code: 0,
        }
    }

    /// Feed a chunk. Payload bytes are unmasked in place, which is why
    /// the chunk is taken mutably. On a protocol error the rest of the
    /// chunk is discarded.
    pub fn receive(&mut self, chunk: &mut [u8], sink: &mut impl FrameSink) {
        let mut consumed = 0;

        while consumed < chunk.len() {
            match self.state {
                State::Begin => {
                    self.state = State::Opcode;
                }
                State::Opcode => {
                    self.read_opcode(chunk[consumed], sink);
                    consumed += 1;
                }
                State::Length => {
                    self.read_length(chunk[consumed], sink);
                    consumed += 1;
                }
                State::ELength => {
                    consumed += self.read_elength(&chunk[consumed..]);
                }
                State::MaskingKey => {
                    consumed += self.read_masking_key(&chunk[consumed..], sink);
                }
                State::Payload => {
                    consumed += self.read_payload(&mut chunk[consumed..], sink);
                }
                State::Error => {
                    self.report_error(sink);
                    return;
                }
            }
        }

        // An error on the chunk's last byte still has to surface.
        if self.state == State::Error {
            self.report_error(sink);
        }
    }

    fn read_opcode(&mut self, byte: u8, sink: &mut impl FrameSink) {
        self.fin = byte & 0x80 != 0;
        self.opcode = byte & 0x0f;

        if !self.continuation {
            sink.on_message_start(self.opcode);
            self.state = State::Length;
        } else if self.opcode == OPCODE_CONTINUATION {
            self.state = State::Length;
        } else {
            debug!(
                "opcode {:#x} inside fragmented message",
                self.opcode
            );
            self.state = State::Error;
            self.error_code = CLOSE_PROTOCOL_ERROR;
        }
        self.continuation = !self.fin;
    }

    fn read_length(&mut self, byte: u8, sink: &mut impl FrameSink) {
        self.masked = byte & 0x80 != 0;
        let preliminary = byte & 0x7f;

        if preliminary > 125 {
            self.elength_left = if preliminary == 126 { 2 } else { 8 };
            self.length = 0;
            self.state = State::ELength;
        } else {
            self.length = u64::from(preliminary);
            if self.masked {
                self.key_left = 4;
                self.state = State::MaskingKey;
            } else if self.length > 0 {
                self.state = State::Payload;
            } else {
                if self.fin {
                    metrics::WS_MESSAGES.increment();
                    sink.on_message_end();
                }
                self.reset_frame();
            }
        }
    }

    fn read_elength(&mut self, chunk: &[u8]) -> usize {
        let mut consumed = 0;

        while consumed < chunk.len() && self.elength_left > 0 {
            self.length = (self.length << 8) | u64::from(chunk[consumed]);
            consumed += 1;
            self.elength_left -= 1;
        }

        if self.elength_left == 0 {
            if self.length & (1 << 63) != 0 {
                self.state = State::Error;
                self.error_code = CLOSE_LENGTH_OVERFLOW;
            } else if self.masked {
                self.key_left = 4;
                self.state = State::MaskingKey;
            } else {
                self.state = State::Payload;
            }
        }

        consumed
    }

    fn read_masking_key(&mut self, chunk: &[u8], sink: &mut impl FrameSink) -> usize {
        let mut consumed = 0;

        while consumed < chunk.len() && self.key_left > 0 {
            self.key[(4 - self.key_left) as usize] = chunk[consumed];
            consumed += 1;
            self.key_left -= 1;
        }

        if self.key_left == 0 {
            if self.length > 0 {
                self.state = State::Payload;
            } else {
                if self.fin {
                    metrics::WS_MESSAGES.increment();
                    sink.on_message_end();
                }
                self.reset_frame();
            }
        }

        consumed
    }

    fn read_payload(&mut self, chunk: &mut [u8], sink: &mut impl FrameSink) -> usize {
        let remaining = self.length - self.payload_read;
        let take = (chunk.len() as u64).min(remaining) as usize;

        if take > 0 {
            let slice = &mut chunk[..take];
            // An unmasked frame never set the key, so the XOR with zeros
            // is the identity.
            mask::apply_mask(self.key, self.payload_read, slice);
            sink.on_frame_data(slice);
            self.payload_read += take as u64;
        }

        if self.payload_read == self.length {
            if self.fin {
                metrics::WS_MESSAGES.increment();
                sink.on_message_end();
            }
            self.reset_frame();
        }

        take
    }

    fn report_error(&mut self, sink: &mut impl FrameSink) {
        metrics::WS_PROTOCOL_ERRORS.increment();
        sink.on_error(self.error_code);
        self.continuation = false;
        self.reset_frame();
    }

    /// Clear per-frame state for the next frame. `continuation` survives:
    /// it belongs to the message, not the frame.
    fn reset_frame(&mut self) {
        self.state = State::Begin;
        self.fin = false;
        self.opcode = 0;
        self.masked = false;
        self.length = 0;
        self.elength_left = 0;
        self.key = [0; 4];
        self.key_left = 0;
        self.payload_read = 0;
        self.error_code = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameHead, OPCODE_BINARY, OPCODE_TEXT};

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        message: Vec<u8>,
    }

    impl FrameSink for Recorder {
        fn on_message_start(&mut self, opcode: u8) {
            self.events.push(format!("start:{opcode}"));
        }
        fn on_frame_data(&mut self, data: &[u8]) {
            self.message.extend_from_slice(data);
        }
        fn on_message_end(&mut self) {
            self.events.push(format!("end:{}", self.message.len()));
        }
        fn on_error(&mut self, code: u16) {
            self.events.push(format!("error:{code}"));
        }
    }

    fn client_frame(fin: bool, opcode: u8, key: [u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        FrameHead {
            fin,
            opcode,
            mask: Some(key),
            length: payload.len() as u64,
        }
        .encode(&mut buf);
        let start = buf.len();
        buf.extend_from_slice(payload);
        mask::apply_mask(key, 0, &mut buf[start..]);
        buf
    }

    #[test]
    fn single_frame_text() {
        // The RFC 6455 masked "hello" example.
        let mut input = vec![0x81, 0x85, 0x01, 0x02, 0x03, 0x04, 0x69, 0x67, 0x6f, 0x68, 0x6e];
        let mut receiver = FrameReceiver::new();
        let mut sink = Recorder::default();
        receiver.receive(&mut input, &mut sink);

        assert_eq!(sink.events, vec!["start:1", "end:5"]);
        assert_eq!(sink.message, b"hello");
    }

    #[test]
    fn one_byte_at_a_time() {
        let key = [0xa5, 0x5a, 0x11, 0xee];
        let input = client_frame(true, OPCODE_BINARY, key, b"fragmented input");

        let mut whole_in = input.clone();
        let mut whole = Recorder::default();
        FrameReceiver::new().receive(&mut whole_in, &mut whole);

        let mut receiver = FrameReceiver::new();
        let mut split = Recorder::default();
        for b in input.iter() {
            let mut one = [*b];
            receiver.receive(&mut one, &mut split);
        }

        assert_eq!(whole.events, split.events);
        assert_eq!(whole.message, split.message);
        assert_eq!(split.message, b"fragmented input");
    }

    #[test]
    fn fragmented_message_reassembles() {
        let mut first = client_frame(false, OPCODE_TEXT, [9, 8, 7, 6], b"he");
        let mut second = client_frame(true, OPCODE_CONTINUATION, [1, 1, 2, 2], b"llo");

        let mut receiver = FrameReceiver::new();
        let mut sink = Recorder::default();
        receiver.receive(&mut first, &mut sink);
        assert_eq!(sink.events, vec!["start:1"]);

        receiver.receive(&mut second, &mut sink);
        assert_eq!(sink.events, vec!["start:1", "end:5"]);
        assert_eq!(sink.message, b"hello");
    }

    #[test]
    fn non_continuation_inside_fragment_is_1002() {
        let mut first = client_frame(false, OPCODE_TEXT, [9, 8, 7, 6], b"he");
        let mut bad = client_frame(true, OPCODE_TEXT, [1, 2, 3, 4], b"x");

        let mut receiver = FrameReceiver::new();
        let mut sink = Recorder::default();
        receiver.receive(&mut first, &mut sink);
        receiver.receive(&mut bad, &mut sink);

        assert_eq!(sink.events, vec!["start:1", "error:1002"]);

        // The receiver reset; a fresh message parses cleanly.
        let mut next = client_frame(true, OPCODE_TEXT, [4, 3, 2, 1], b"ok");
        sink.message.clear();
        receiver.receive(&mut next, &mut sink);
        assert_eq!(sink.events, vec!["start:1", "error:1002", "start:1", "end:2"]);
    }

    #[test]
    fn length_top_bit_is_1004() {
        let mut input = vec![0x82, 0xff];
        input.extend_from_slice(&(1u64 << 63).to_be_bytes());

        let mut receiver = FrameReceiver::new();
        let mut sink = Recorder::default();
        receiver.receive(&mut input, &mut sink);
        assert_eq!(sink.events, vec!["start:2", "error:1004"]);
    }

    #[test]
    fn zero_length_fin_frame_is_a_message() {
        let mut input = vec![0x81, 0x80, 1, 2, 3, 4]; // masked, empty, fin
        let mut receiver = FrameReceiver::new();
        let mut sink = Recorder::default();
        receiver.receive(&mut input, &mut sink);
        assert_eq!(sink.events, vec!["start:1", "end:0"]);
    }

    #[test]
    fn two_byte_extended_length_payload() {
        let key = [3, 1, 4, 1];
        let payload = vec![0x42u8; 300];
        let mut input = client_frame(true, OPCODE_BINARY, key, &payload);

        let mut receiver = FrameReceiver::new();
        let mut sink = Recorder::default();
        receiver.receive(&mut input, &mut sink);
        assert_eq!(sink.events, vec!["start:2", "end:300"]);
        assert_eq!(sink.message, payload);
    }

    #[test]
    fn unmasked_frame_passes_payload_untouched() {
        let mut input = vec![0x81, 0x03];
        input.extend_from_slice(b"abc");

        let mut receiver = FrameReceiver::new();
        let mut sink = Recorder::default();
        receiver.receive(&mut input, &mut sink);
        assert_eq!(sink.message, b"abc");
        assert_eq!(sink.events, vec!["start:1", "end:3"]);
    }

    #[test]
    fn back_to_back_messages_in_one_chunk() {
        let mut input = client_frame(true, OPCODE_TEXT, [1, 2, 3, 4], b"one");
        input.extend(client_frame(true, OPCODE_TEXT, [5, 6, 7, 8], b"two"));

        let mut receiver = FrameReceiver::new();
        let mut sink = Recorder::default();
        receiver.receive(&mut input, &mut sink);
        assert_eq!(sink.events, vec!["start:1", "end:3", "start:1", "end:6"]);
        assert_eq!(sink.message, b"onetwo");
    }
}
