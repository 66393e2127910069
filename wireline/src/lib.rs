//! wireline — slim toolkit for network communication.
//!
//! The core of a server-side protocol stack: an abstract duplex byte
//! channel, a layered TLS transport, socket addressing across families,
//! and the immutable configuration record the protocol engines consume.
//! The OS-level descriptor and the event loop that drives readiness are
//! deliberately outside this crate; everything here is sans-IO and
//! single-threaded per connection.
//!
//! # Quick Start
//!
//! ```rust
//! use wireline::{ByteStream, MemoryStream, Transport};
//!
//! let mut transport = Transport::plain();
//! let mut stream = MemoryStream::new();
//!
//! transport.write(b"hello").unwrap();
//! stream.enqueue(&transport.take_output());
//! assert_eq!(stream.take_output(), b"hello");
//! ```
//!
//! The HTTP/1.1 engine lives in `wireline-http`, the WebSocket receiver in
//! `wireline-ws`; both sit on the abstractions defined here.

pub mod addr;
pub mod config;
pub mod error;
pub mod metrics;
pub mod stream;
pub mod tls;

/// A peer or local address, independent of address family.
pub use addr::SocketAddress;
/// Immutable per-server configuration.
pub use config::Config;
/// Builder for [`Config`] with `build()` validation.
pub use config::ConfigBuilder;
/// Core errors.
pub use error::Error;
/// Outbound half of a duplex byte channel.
pub use stream::ByteStream;
/// In-memory [`ByteStream`] for tests and socketless embeddings.
pub use stream::MemoryStream;
/// Callbacks delivered by the driving event loop.
pub use stream::StreamObserver;
/// TLS session lifecycle phase.
pub use tls::Phase;
/// Negotiated TLS session details.
pub use tls::TlsInfo;
/// Plain-or-TLS connection transport.
pub use tls::Transport;
/// Event produced when feeding bytes into a [`Transport`].
pub use tls::TransportEvent;
