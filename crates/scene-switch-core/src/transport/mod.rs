//! Pipe transport
//!
//! One duplex byte-stream connection to the host's fixed pipe endpoint.
//! [`Connector`] opens connections; [`PipeTransport`] frames messages on an
//! open one. The transport never reconnects on its own: after a write or read
//! failure the caller must drop it and connect again.

mod pipe;
mod stream;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use pipe::NamedPipeConnector;
pub use stream::{PipeStream, READ_CHUNK};

use async_trait::async_trait;
use std::string::FromUtf8Error;
use std::time::Duration;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint does not exist or refused the open
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// A write did not complete
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    /// A read failed or the host closed the stream
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    /// No line terminator arrived before the read deadline
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The received bytes are not UTF-8 text
    #[error("response is not valid UTF-8: {0}")]
    Framing(#[from] FromUtf8Error),

    /// The transport was already closed
    #[error("transport is closed")]
    Closed,
}

impl TransportError {
    /// Framing errors are local to one message; the stream itself is intact.
    pub fn is_framing(&self) -> bool {
        matches!(self, TransportError::Framing(_))
    }
}

/// An open, framed connection to the host.
#[async_trait]
pub trait PipeTransport: Send {
    /// Write the whole buffer.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Write`] on any partial write or I/O failure.
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read until a chunk containing `\n` arrives and return everything read.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Read`] on I/O failure or end of stream,
    /// [`TransportError::Timeout`] when the read deadline passes, and
    /// [`TransportError::Framing`] when the bytes are not UTF-8.
    async fn receive_line(&mut self) -> Result<String>;

    /// Release the underlying handle. Idempotent, never fails.
    async fn close(&mut self);
}

/// Opens connections to one fixed endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: PipeTransport;

    /// Address of the endpoint, for logging.
    fn address(&self) -> &str;

    /// Open a new connection.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] when the endpoint is missing or
    /// refuses the open (e.g. the host application is not running).
    async fn connect(&self) -> Result<Self::Transport>;
}
