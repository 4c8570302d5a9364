//! Line framing over any async byte stream

use super::{PipeTransport, Result, TransportError};
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of a single read from the pipe.
pub const READ_CHUNK: usize = 4096;

/// [`PipeTransport`] over an owned duplex stream.
///
/// Used with the OS pipe handle in production and with
/// [`tokio::io::duplex`] in tests.
#[derive(Debug)]
pub struct PipeStream<S> {
    stream: Option<S>,
    read_timeout: Duration,
}

impl<S> PipeStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, read_timeout: Duration) -> Self {
        Self {
            stream: Some(stream),
            read_timeout,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

#[async_trait]
impl<S> PipeTransport for PipeStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        stream.write_all(bytes).await.map_err(TransportError::Write)?;
        stream.flush().await.map_err(TransportError::Write)?;
        Ok(())
    }

    async fn receive_line(&mut self) -> Result<String> {
        let deadline = self.read_timeout;
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        let mut data = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];

        let read_until_newline = async {
            loop {
                let n = stream.read(&mut chunk).await.map_err(TransportError::Read)?;
                if n == 0 {
                    return Err(TransportError::Read(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "pipe closed by host",
                    )));
                }
                data.extend_from_slice(&chunk[..n]);
                if chunk[..n].contains(&b'\n') {
                    return Ok(());
                }
            }
        };

        tokio::time::timeout(deadline, read_until_newline)
            .await
            .map_err(|_| TransportError::Timeout(deadline))??;

        Ok(String::from_utf8(data)?)
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }
}
