//! Transport over any tokio byte stream.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::Transport;
use crate::error::TransportError;

/// Read size used when the buffer runs dry.
const CHUNK_SIZE: usize = 4096;

/// [`Transport`] over an `AsyncRead + AsyncWrite` stream.
pub struct IoTransport<S> {
    stream: S,
    read_buf: BytesMut,
    closed: bool,
}

/// Plain TCP transport (raw text, no telnet option negotiation).
pub type TcpTransport = IoTransport<TcpStream>;

impl<S> IoTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(CHUNK_SIZE),
            closed: false,
        }
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl IoTransport<TcpStream> {
    /// Connect to `host:port`, giving up after `timeout`.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, TransportError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|source| TransportError::ConnectionFailed {
                host: host.to_string(),
                port,
                source,
            })?;
        stream.set_nodelay(true)?;
        debug!("connected to {}:{}", host, port);
        Ok(Self::new(stream))
    }
}

impl<S> Transport for IoTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Disconnected);
        }
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Bytes>, TransportError> {
        if self.closed {
            return Ok(None);
        }
        self.read_buf.reserve(CHUNK_SIZE);
        // read_buf is cancel-safe: nothing is consumed unless it completes.
        let n = self.stream.read_buf(&mut self.read_buf).await?;
        if n == 0 {
            self.closed = true;
            return Ok(None);
        }
        Ok(Some(self.read_buf.split().freeze()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_reads_chunks_then_eof() {
        let mock = Builder::new()
            .read(b"Password: ")
            .write(b"secret\r\n")
            .read(b"router>")
            .build();
        let mut transport = IoTransport::new(mock);

        let chunk = assert_ok!(transport.read().await);
        assert_eq!(chunk.as_deref(), Some(&b"Password: "[..]));

        assert_ok!(transport.write(b"secret\r\n").await);

        let chunk = assert_ok!(transport.read().await);
        assert_eq!(chunk.as_deref(), Some(&b"router>"[..]));

        // Script exhausted: the peer is gone
        assert_eq!(assert_ok!(transport.read().await), None);
        assert_eq!(assert_ok!(transport.read().await), None);
    }

    #[tokio::test]
    async fn test_write_after_eof_fails() {
        let mock = Builder::new().build();
        let mut transport = IoTransport::new(mock);

        assert_eq!(assert_ok!(transport.read().await), None);
        assert_err!(transport.write(b"exit\r\n").await);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(2))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::ConnectionFailed { port: p, .. } if p == port));
    }
}
