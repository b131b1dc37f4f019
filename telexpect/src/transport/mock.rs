//! Scripted in-memory transport for exercising sessions without a device.
//!
//! A [`Script`] lists what the fake device emits and what it expects to be
//! written, in order. Chunk boundaries are exactly those given to the
//! script, so tests control how the stream is split.
//!
//! ```rust
//! use telexpect::transport::mock::{Script, ScriptedTransport};
//!
//! let transport = ScriptedTransport::new(
//!     Script::new()
//!         .emit("Password: ")
//!         .expect_write("secret\r\n")
//!         .emit("\r\nrouter>"),
//! );
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use super::Transport;
use crate::error::TransportError;

/// One step of a device script.
#[derive(Debug, Clone)]
enum Step {
    /// Deliver a chunk to the reader.
    Emit(Bytes),
    /// Expect these bytes to be written next.
    ExpectWrite(Vec<u8>),
    /// Hold further output for a while.
    Delay(Duration),
    /// Hold further output until the given instant.
    Until(Instant),
    /// Never produce anything again.
    Stall,
    /// Close the connection.
    Close,
}

/// Builder for a fake device's behaviour.
#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    /// Create an empty script. An exhausted script reads as a closed
    /// connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `text` as a single chunk.
    pub fn emit(mut self, text: impl AsRef<[u8]>) -> Self {
        self.steps
            .push(Step::Emit(Bytes::copy_from_slice(text.as_ref())));
        self
    }

    /// Emit `text` split into chunks of the given sizes; any remainder
    /// becomes a final chunk.
    pub fn emit_split(mut self, text: impl AsRef<[u8]>, sizes: &[usize]) -> Self {
        let mut rest = text.as_ref();
        for &size in sizes {
            if rest.is_empty() {
                break;
            }
            let (head, tail) = rest.split_at(size.min(rest.len()));
            if !head.is_empty() {
                self.steps.push(Step::Emit(Bytes::copy_from_slice(head)));
            }
            rest = tail;
        }
        if !rest.is_empty() {
            self.steps.push(Step::Emit(Bytes::copy_from_slice(rest)));
        }
        self
    }

    /// Emit `text` one byte at a time.
    pub fn emit_bytewise(mut self, text: impl AsRef<[u8]>) -> Self {
        for byte in text.as_ref() {
            self.steps
                .push(Step::Emit(Bytes::copy_from_slice(std::slice::from_ref(byte))));
        }
        self
    }

    /// Expect the session to write `data` next.
    pub fn expect_write(mut self, data: impl AsRef<[u8]>) -> Self {
        self.steps.push(Step::ExpectWrite(data.as_ref().to_vec()));
        self
    }

    /// Hold further output for `duration`.
    pub fn delay(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Delay(duration));
        self
    }

    /// Stop producing output without closing.
    pub fn stall(mut self) -> Self {
        self.steps.push(Step::Stall);
        self
    }

    /// Close the connection.
    pub fn close(mut self) -> Self {
        self.steps.push(Step::Close);
        self
    }

    /// Continue with the steps of `next`.
    pub fn chain(mut self, next: Script) -> Self {
        self.steps.extend(next.steps);
        self
    }
}

/// [`Transport`] that plays back a [`Script`].
///
/// Reading while the script waits for a write behaves like a device waiting
/// for input: nothing arrives. Writes are compared against the next
/// expected write and panic on mismatch; all writes are also recorded.
#[derive(Debug)]
pub struct ScriptedTransport {
    steps: VecDeque<Step>,
    written: Arc<Mutex<Vec<u8>>>,
    closed: bool,
}

impl ScriptedTransport {
    /// Create a transport playing `script`.
    pub fn new(script: Script) -> Self {
        Self {
            steps: script.steps.into(),
            written: Arc::new(Mutex::new(Vec::new())),
            closed: false,
        }
    }

    /// Handle to everything written so far, usable after the transport
    /// has moved into a session.
    pub fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        self.written.clone()
    }

    /// Number of expected writes not yet performed.
    pub fn pending_writes(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, Step::ExpectWrite(_)))
            .count()
    }

    fn match_write(&mut self, mut data: &[u8]) {
        for step in self.steps.iter_mut() {
            match step {
                Step::ExpectWrite(expected) => {
                    let n = expected.len().min(data.len());
                    assert_eq!(
                        String::from_utf8_lossy(&data[..n]),
                        String::from_utf8_lossy(&expected[..n]),
                        "write mismatch"
                    );
                    expected.drain(..n);
                    data = &data[n..];
                    if data.is_empty() {
                        break;
                    }
                }
                Step::Delay(_) | Step::Until(_) | Step::Stall | Step::Close => break,
                Step::Emit(_) => {}
            }
        }
        self.steps
            .retain(|step| !matches!(step, Step::ExpectWrite(expected) if expected.is_empty()));
    }
}

impl Transport for ScriptedTransport {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Disconnected);
        }
        if let Ok(mut written) = self.written.lock() {
            written.extend_from_slice(data);
        }
        self.match_write(data);
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            if self.closed {
                return Ok(None);
            }
            match self.steps.front_mut() {
                None | Some(Step::Close) => {
                    self.closed = true;
                    return Ok(None);
                }
                Some(Step::Emit(_)) => {
                    if let Some(Step::Emit(chunk)) = self.steps.pop_front() {
                        return Ok(Some(chunk));
                    }
                }
                Some(step @ Step::Delay(_)) => {
                    // Fix the deadline so a cancelled read does not restart it
                    if let Step::Delay(duration) = *step {
                        *step = Step::Until(Instant::now() + duration);
                    }
                }
                Some(Step::Until(deadline)) => {
                    tokio::time::sleep_until(*deadline).await;
                    self.steps.pop_front();
                }
                Some(Step::ExpectWrite(_)) | Some(Step::Stall) => {
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emits_chunks_in_order() {
        let mut transport =
            ScriptedTransport::new(Script::new().emit("ab").emit_split("cdefg", &[2, 1]));

        let mut chunks = Vec::new();
        while let Some(chunk) = transport.read().await.unwrap() {
            chunks.push(chunk);
        }
        assert_eq!(chunks, vec!["ab", "cd", "e", "fg"]);
    }

    #[tokio::test]
    async fn test_writes_are_matched_and_recorded() {
        let mut transport = ScriptedTransport::new(
            Script::new()
                .emit("Username: ")
                .expect_write("admin\r\n")
                .emit("Password: "),
        );
        let written = transport.written();

        assert_eq!(transport.read().await.unwrap().unwrap(), "Username: ");
        assert_eq!(transport.pending_writes(), 1);
        transport.write(b"admin").await.unwrap();
        transport.write(b"\r\n").await.unwrap();
        assert_eq!(transport.pending_writes(), 0);
        assert_eq!(transport.read().await.unwrap().unwrap(), "Password: ");
        assert_eq!(written.lock().unwrap().as_slice(), b"admin\r\n");
    }

    #[tokio::test]
    #[should_panic(expected = "write mismatch")]
    async fn test_unexpected_write_panics() {
        let mut transport = ScriptedTransport::new(Script::new().expect_write("enable\r\n"));
        transport.write(b"exit\r\n").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_for_input_reads_nothing() {
        let mut transport = ScriptedTransport::new(Script::new().expect_write("y\r\n"));
        let read = tokio::time::timeout(Duration::from_secs(5), transport.read()).await;
        assert!(read.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_survives_cancelled_read() {
        let mut transport = ScriptedTransport::new(
            Script::new()
                .delay(Duration::from_secs(2))
                .emit("late"),
        );
        let start = Instant::now();

        let first = tokio::time::timeout(Duration::from_secs(1), transport.read()).await;
        assert!(first.is_err());

        let chunk = transport.read().await.unwrap().unwrap();
        assert_eq!(chunk, "late");
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let mut transport = ScriptedTransport::new(Script::new().close().emit("never"));
        assert!(transport.read().await.unwrap().is_none());
        assert!(transport.write(b"x").await.is_err());
    }
}
