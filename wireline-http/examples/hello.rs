//! Drive the HTTP engine without a socket: feed wire bytes in, print the
//! wire bytes that would go back out.

use std::sync::Arc;

use wireline::{Config, MemoryStream};
use wireline_http::{Request, RequestHandler, Response, ServerContext};

struct Hello;

impl RequestHandler for Hello {
    fn on_request_ready(&mut self, request: &Request, response: &mut Response) {
        let who = request.query("who").unwrap_or("world");
        response.set_header("Content-Type", "text/plain");
        response.send(format!("hello, {who}\n").as_bytes());
    }
}

fn main() {
    let mut ctx = ServerContext::new(Arc::new(Config::default()), Hello);
    let mut stream = MemoryStream::new();

    ctx.receive(b"GET /demo?who=wireline HTTP/1.1\r\nHost: localhost\r\n\r\n");
    ctx.pump_into(&mut stream);

    print!("{}", String::from_utf8_lossy(&stream.take_output()));
}
