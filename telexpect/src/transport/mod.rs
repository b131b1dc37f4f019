//! Text-stream transports.
//!
//! The session engine only needs to write bytes, receive arbitrarily
//! chunked bytes and close the connection. Implementations exist for any
//! tokio byte stream (TCP in particular) and for an SSH shell channel.

pub mod config;
mod io;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod ssh;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use io::{IoTransport, TcpTransport};
pub use ssh::SshTransport;

use std::future::Future;

use bytes::Bytes;

use crate::error::TransportError;

/// A bidirectional text stream to a device.
///
/// No framing is assumed: chunk boundaries are arbitrary.
pub trait Transport: Send {
    /// Write bytes to the device.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receive the next chunk, or `None` once the connection is closed.
    ///
    /// Must be cancel-safe: dropping the future before it completes must
    /// not lose received data.
    fn read(&mut self) -> impl Future<Output = Result<Option<Bytes>, TransportError>> + Send;

    /// Close the connection.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
