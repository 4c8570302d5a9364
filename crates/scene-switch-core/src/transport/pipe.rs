//! OS pipe connector
//!
//! On Windows the host listens on a named pipe (`\\.\pipe\slobs`). Elsewhere
//! the same protocol is served over a Unix domain socket path.

use super::{Connector, PipeStream, Result, TransportError};
use crate::config::Config;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[cfg(windows)]
type RawPipe = tokio::net::windows::named_pipe::NamedPipeClient;

#[cfg(unix)]
type RawPipe = tokio::net::UnixStream;

/// Connects to the host's pipe endpoint.
#[derive(Debug, Clone)]
pub struct NamedPipeConnector {
    address: String,
    read_timeout: Duration,
}

impl NamedPipeConnector {
    pub fn new(address: impl Into<String>, read_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            read_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.pipe_name.clone(), config.read_timeout())
    }
}

#[async_trait]
impl Connector for NamedPipeConnector {
    type Transport = PipeStream<RawPipe>;

    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<Self::Transport> {
        debug!("Opening pipe {}", self.address);
        let raw = open_pipe(&self.address)
            .await
            .map_err(|source| TransportError::Connect {
                address: self.address.clone(),
                source,
            })?;
        Ok(PipeStream::new(raw, self.read_timeout))
    }
}

#[cfg(windows)]
async fn open_pipe(address: &str) -> std::io::Result<RawPipe> {
    tokio::net::windows::named_pipe::ClientOptions::new().open(address)
}

#[cfg(unix)]
async fn open_pipe(address: &str) -> std::io::Result<RawPipe> {
    tokio::net::UnixStream::connect(address).await
}
