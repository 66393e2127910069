use std::io;

use thiserror::Error;

/// Errors returned by the wireline core.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying transport I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// TLS session error.
    #[error("TLS: {0}")]
    Tls(#[from] rustls::Error),
    /// Configuration rejected at build time.
    #[error("config: {0}")]
    Config(String),
    /// Operation attempted on a closed stream.
    #[error("connection closed")]
    ConnectionClosed,
}
