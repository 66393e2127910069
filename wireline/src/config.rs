//! Connection-toolkit configuration.
//!
//! One immutable [`Config`] record per server, passed to every protocol
//! context at construction. There is no process-wide mutable state; two
//! servers in one process can run with two different configs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Immutable configuration shared read-only across connections.
#[derive(Clone)]
pub struct Config {
    /// Root directory for file responses. Paths are canonicalized beneath
    /// this before anything is read.
    pub document_root: PathBuf,
    /// Identifier emitted in the `X-Powered-By` response header.
    pub server_token: String,
    /// Whether connections may be reused for subsequent requests at all.
    /// When false, every response closes the connection regardless of what
    /// the request asked for.
    pub keep_alive: bool,
    /// Upper bound on the size of one request's header block, in bytes.
    pub max_header_size: usize,
    /// Read inactivity timeout, enforced by the driving event loop.
    /// Expiry is delivered to the context as a read error.
    pub read_timeout: Duration,
    /// Write inactivity timeout, enforced by the driving event loop.
    pub write_timeout: Duration,
    /// Server-side TLS. When set, accepted connections run the handshake
    /// as a pre-phase before any request parsing.
    pub tls: Option<Arc<rustls::ServerConfig>>,
    /// Client-side TLS for outbound connections.
    pub tls_client: Option<Arc<rustls::ClientConfig>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            document_root: PathBuf::from("."),
            server_token: "wireline".to_string(),
            keep_alive: true,
            max_header_size: 64 * 1024,
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(60),
            tls: None,
            tls_client: None,
        }
    }
}

impl Config {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.document_root.as_os_str().is_empty() {
            return Err(crate::error::Error::Config(
                "document_root must not be empty".into(),
            ));
        }
        if self.max_header_size == 0 {
            return Err(crate::error::Error::Config(
                "max_header_size must be > 0".into(),
            ));
        }
        if self.server_token.is_empty() {
            return Err(crate::error::Error::Config(
                "server_token must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`Config`] with discoverable methods and `build()` validation.
///
/// # Example
///
/// ```rust
/// use wireline::ConfigBuilder;
///
/// let config = ConfigBuilder::default()
///     .document_root("/var/www")
///     .server_token("myapp")
///     .keep_alive(true)
///     .build()
///     .expect("invalid config");
/// ```
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default config values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the document root for file responses.
    pub fn document_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.document_root = path.into();
        self
    }

    /// Set the server identifier emitted on responses.
    pub fn server_token(mut self, token: impl Into<String>) -> Self {
        self.config.server_token = token.into();
        self
    }

    /// Allow or forbid connection reuse.
    pub fn keep_alive(mut self, enable: bool) -> Self {
        self.config.keep_alive = enable;
        self
    }

    /// Set the maximum request header block size in bytes.
    pub fn max_header_size(mut self, bytes: usize) -> Self {
        self.config.max_header_size = bytes;
        self
    }

    /// Set the read inactivity timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the write inactivity timeout.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Set server-side TLS configuration.
    pub fn tls(mut self, config: Arc<rustls::ServerConfig>) -> Self {
        self.config.tls = Some(config);
        self
    }

    /// Set client-side TLS configuration for outbound connections.
    pub fn tls_client(mut self, config: Arc<rustls::ClientConfig>) -> Self {
        self.config.tls_client = Some(config);
        self
    }

    /// Validate and build the final [`Config`].
    pub fn build(self) -> Result<Config, crate::error::Error> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn builder_sets_fields() {
        let config = ConfigBuilder::new()
            .document_root("/srv/www")
            .server_token("app")
            .keep_alive(false)
            .max_header_size(8192)
            .build()
            .unwrap();
        assert_eq!(config.document_root, PathBuf::from("/srv/www"));
        assert_eq!(config.server_token, "app");
        assert!(!config.keep_alive);
        assert_eq!(config.max_header_size, 8192);
    }

    #[test]
    fn zero_header_limit_rejected() {
        let err = ConfigBuilder::new().max_header_size(0).build();
        assert!(err.is_err());
    }

    #[test]
    fn empty_document_root_rejected() {
        let err = ConfigBuilder::new().document_root("").build();
        assert!(err.is_err());
    }
}
