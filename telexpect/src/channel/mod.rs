//! Channel layer: pattern waits over a transport's byte stream.
//!
//! A [`Channel`] owns a transport, the receive buffer and the expectation
//! slot. Bytes are buffered as they arrive and matched against the active
//! expectation; matched text is consumed from the front of the buffer and
//! never offered again.

mod buffer;
mod expect;
mod patterns;

pub use buffer::StreamBuffer;
pub use expect::{ActiveSlot, ExpectQueue, Expectation, Matched};
pub use patterns::{MatchSpan, Pattern, compile_prompt_pattern, find_earliest};

use std::borrow::Cow;
use std::time::Duration;

use log::{debug, trace};
use tokio::time::Instant;

use crate::error::ChannelError;
use crate::transport::Transport;

/// A transport plus the state needed to wait for patterns on it.
pub struct Channel<T> {
    transport: T,
    buffer: StreamBuffer,
    queue: ExpectQueue,
    closed: bool,
}

impl<T: Transport> Channel<T> {
    /// Wrap `transport`.
    pub fn new(transport: T, strip_ansi: bool, keep_transcript: bool) -> Self {
        Self {
            transport,
            buffer: StreamBuffer::new(strip_ansi, keep_transcript),
            queue: ExpectQueue::new(),
            closed: false,
        }
    }

    /// Write raw bytes.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed {
                pending: self.buffer.take(),
            });
        }
        self.transport.write(data).await?;
        Ok(())
    }

    /// Write `line` followed by `terminator`.
    pub async fn send_line(&mut self, line: &str, terminator: &str) -> Result<(), ChannelError> {
        let mut data = Vec::with_capacity(line.len() + terminator.len());
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(terminator.as_bytes());
        self.send(&data).await
    }

    /// Wait up to `timeout` for the earliest match of any pattern.
    ///
    /// See [`Channel::wait_until`].
    pub async fn wait_for<K: Copy>(
        &mut self,
        expectations: &[(K, &Pattern)],
        timeout: Duration,
    ) -> Result<Matched<K>, ChannelError> {
        self.wait_until(expectations, Instant::now() + timeout).await
    }

    /// Wait until `deadline` for the earliest match of any pattern.
    ///
    /// Text already buffered is searched first, so bytes that arrived
    /// before the call are never missed. On a match the buffer is consumed
    /// up to the end of the match and the caller's key for the matching
    /// pattern is returned with the preceding text. On timeout the whole
    /// buffer is handed over in the error. The expectation slot is released
    /// on every outcome, including the future being dropped.
    pub async fn wait_until<K: Copy>(
        &mut self,
        expectations: &[(K, &Pattern)],
        deadline: Instant,
    ) -> Result<Matched<K>, ChannelError> {
        let Self {
            transport,
            buffer,
            queue,
            closed,
        } = self;

        let registered = Instant::now();
        let _slot = queue.claim(Expectation {
            tags: expectations
                .iter()
                .map(|(_, pattern)| pattern.tag().to_string())
                .collect(),
            registered,
            deadline,
        })?;

        loop {
            let span = find_earliest(
                buffer.as_slice(),
                expectations.iter().map(|(_, pattern)| *pattern),
            );
            if let Some(span) = span {
                let (key, pattern) = expectations[span.index];
                let (before, matched) = buffer.consume(span.start, span.end);
                trace!("matched {:?}: {:?}", pattern.tag(), matched);
                return Ok(Matched {
                    key,
                    tag: pattern.tag().to_string(),
                    before,
                    matched,
                });
            }

            if *closed {
                return Err(ChannelError::Closed {
                    pending: buffer.take(),
                });
            }

            match tokio::time::timeout_at(deadline, transport.read()).await {
                Ok(Ok(Some(chunk))) => {
                    trace!("received {} bytes: {:?}", chunk.len(), String::from_utf8_lossy(&chunk));
                    buffer.extend(&chunk);
                }
                Ok(Ok(None)) => {
                    debug!("transport closed while waiting");
                    *closed = true;
                }
                Ok(Err(e)) => {
                    *closed = true;
                    return Err(e.into());
                }
                Err(_) => {
                    // Unmatched text goes with the error so it cannot end a later wait
                    return Err(ChannelError::PatternTimeout {
                        after: deadline.saturating_duration_since(registered),
                        pending: buffer.take(),
                    });
                }
            }
        }
    }

    /// Close the transport.
    pub async fn close(&mut self) -> Result<(), ChannelError> {
        self.closed = true;
        self.transport.close().await?;
        Ok(())
    }

    /// Drop unconsumed text, such as late output of an abandoned command.
    pub fn discard(&mut self) {
        if !self.buffer.is_empty() {
            debug!("discarding {} unconsumed bytes", self.buffer.len());
            self.buffer.clear();
        }
    }

    /// Whether the transport has been seen to close.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether an expectation is active.
    pub fn is_waiting(&self) -> bool {
        self.queue.is_waiting()
    }

    /// The receive buffer.
    pub fn buffer(&self) -> &StreamBuffer {
        &self.buffer
    }

    /// Everything received, if transcript keeping is enabled.
    pub fn transcript(&self) -> Option<Cow<'_, str>> {
        self.buffer.transcript()
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{Script, ScriptedTransport};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Key {
        User,
        Enabled,
    }

    fn prompts() -> (Pattern, Pattern) {
        (
            Pattern::prompt("prompt", r"switch>").unwrap(),
            Pattern::prompt("enabled_prompt", r"switch#").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_match_across_chunks() {
        let (user, enabled) = prompts();
        let transport = ScriptedTransport::new(Script::new().emit_split("line\r\nswi", &[7]).emit("tch#"));
        let mut channel = Channel::new(transport, true, false);

        let matched = channel
            .wait_for(&[(Key::User, &user), (Key::Enabled, &enabled)], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(matched.key, Key::Enabled);
        assert_eq!(matched.tag, "enabled_prompt");
        assert_eq!(matched.before, "line\r\n");
        assert_eq!(matched.matched, "switch#");
        assert!(!channel.is_waiting());
        assert!(channel.buffer().is_empty());
    }

    #[tokio::test]
    async fn test_earliest_match_wins() {
        let password = Pattern::regex("password", r"Password:").unwrap();
        let failure = Pattern::literal("failure", "% Bad passwords");
        let transport = ScriptedTransport::new(Script::new().emit("% Bad passwords\r\nPassword:"));
        let mut channel = Channel::new(transport, true, false);

        let matched = channel
            .wait_for(&[(0, &password), (1, &failure)], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(matched.key, 1);

        // The remainder is still offered to the next wait
        let matched = channel
            .wait_for(&[(0, &password), (1, &failure)], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(matched.key, 0);
        assert_eq!(matched.before, "\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_pending_text() {
        let (user, _) = prompts();
        let transport = ScriptedTransport::new(Script::new().emit("partial out").stall());
        let mut channel = Channel::new(transport, true, false);

        let start = Instant::now();
        let err = channel
            .wait_for(&[(Key::User, &user)], Duration::from_secs(3))
            .await
            .unwrap_err();
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        match err {
            ChannelError::PatternTimeout { after, pending } => {
                assert_eq!(after, Duration::from_secs(3));
                assert_eq!(pending, "partial out");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!channel.is_waiting());
        assert!(channel.buffer().is_empty());
    }

    #[tokio::test]
    async fn test_close_resolves_pending_wait() {
        let (user, _) = prompts();
        let transport = ScriptedTransport::new(Script::new().emit("bye").close());
        let mut channel = Channel::new(transport, true, false);

        let err = channel
            .wait_for(&[(Key::User, &user)], Duration::from_secs(3))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Closed { ref pending } if pending == "bye"));
        assert!(channel.is_closed());
        assert!(channel.send(b"x").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_wait_releases_slot() {
        let (user, _) = prompts();
        let transport = ScriptedTransport::new(
            Script::new()
                .delay(Duration::from_secs(5))
                .emit("switch>"),
        );
        let mut channel = Channel::new(transport, true, false);

        let abandoned = tokio::time::timeout(
            Duration::from_secs(1),
            channel.wait_for(&[(Key::User, &user)], Duration::from_secs(10)),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(!channel.is_waiting());

        let matched = channel
            .wait_for(&[(Key::User, &user)], Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(matched.key, Key::User);
    }

    #[tokio::test]
    async fn test_send_line_appends_terminator() {
        let transport = ScriptedTransport::new(Script::new().expect_write("show clock\r\n"));
        let written = transport.written();
        let mut channel = Channel::new(transport, true, false);

        channel.send_line("show clock", "\r\n").await.unwrap();
        assert_eq!(written.lock().unwrap().as_slice(), b"show clock\r\n");
        assert_eq!(channel.transport().pending_writes(), 0);
    }
}
