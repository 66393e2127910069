//! The full upgrade path: an HTTP request upgrades the connection, then
//! the same byte stream feeds a WebSocket frame receiver.

use std::sync::Arc;

use wireline::{Config, MemoryStream};
use wireline_http::{Request, RequestHandler, Response, ServerContext};
use wireline_ws::{handshake, mask, FrameHead, FrameReceiver, FrameSink, OPCODE_TEXT};

struct Upgrader;

impl RequestHandler for Upgrader {
    fn on_request_ready(&mut self, request: &Request, response: &mut Response) {
        let key = request.header("sec-websocket-key").unwrap_or_default();
        response.status(101);
        response.set_header("Upgrade", "websocket");
        response.set_header("Connection", "Upgrade");
        response.set_header("Sec-WebSocket-Accept", &handshake::accept_key(key));
        response.end();
    }
}

struct Printer;

impl FrameSink for Printer {
    fn on_message_start(&mut self, opcode: u8) {
        println!("message start, opcode {opcode}");
    }
    fn on_frame_data(&mut self, data: &[u8]) {
        println!("payload: {}", String::from_utf8_lossy(data));
    }
    fn on_message_end(&mut self) {
        println!("message end");
    }
    fn on_error(&mut self, code: u16) {
        println!("protocol error, close code {code}");
    }
}

fn main() {
    let mut ctx = ServerContext::new(Arc::new(Config::default()), Upgrader);
    let mut stream = MemoryStream::new();

    ctx.receive(
        b"GET /chat HTTP/1.1\r\n\
          Host: localhost\r\n\
          Upgrade: websocket\r\n\
          Connection: Upgrade\r\n\
          Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
    );
    ctx.pump_into(&mut stream);
    print!("{}", String::from_utf8_lossy(&stream.take_output()));
    assert!(ctx.is_upgraded());

    // From here on the driver routes inbound bytes to the frame receiver.
    let key = [0x21, 0x9a, 0x33, 0x7c];
    let mut frame = Vec::new();
    FrameHead {
        fin: true,
        opcode: OPCODE_TEXT,
        mask: Some(key),
        length: 12,
    }
    .encode(&mut frame);
    let start = frame.len();
    frame.extend_from_slice(b"hello, again");
    mask::apply_mask(key, 0, &mut frame[start..]);

    let mut receiver = FrameReceiver::new();
    receiver.receive(&mut frame, &mut Printer);
}
