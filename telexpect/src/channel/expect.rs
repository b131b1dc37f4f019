//! The single active expectation of a channel.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::ChannelError;

/// A pending wait: which patterns are eligible and until when.
#[derive(Debug, Clone)]
pub struct Expectation {
    /// Tags of the eligible patterns, in registration order.
    pub tags: Vec<String>,

    /// When the wait started.
    pub registered: Instant,

    /// When the wait gives up.
    pub deadline: Instant,
}

impl Expectation {
    /// The full timeout this expectation was registered with.
    pub fn timeout(&self) -> Duration {
        self.deadline.saturating_duration_since(self.registered)
    }
}

/// Outcome of a successful wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched<K> {
    /// Caller-chosen key of the pattern that matched.
    pub key: K,

    /// Tag of the pattern that matched.
    pub tag: String,

    /// Text preceding the match.
    pub before: String,

    /// The matched text.
    pub matched: String,
}

/// Holds at most one active [`Expectation`].
///
/// Registering while another expectation is active is refused rather than
/// queued, which keeps prompt attribution unambiguous.
#[derive(Debug, Default)]
pub struct ExpectQueue {
    active: Option<Expectation>,
}

impl ExpectQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `expectation` as the active one.
    ///
    /// The returned slot clears the expectation when dropped, whether the
    /// wait matched, timed out, failed or was abandoned.
    pub fn claim(&mut self, expectation: Expectation) -> Result<ActiveSlot<'_>, ChannelError> {
        if self.active.is_some() {
            return Err(ChannelError::ExpectationActive);
        }
        self.active = Some(expectation);
        Ok(ActiveSlot {
            active: &mut self.active,
        })
    }

    /// The active expectation, if any.
    pub fn active(&self) -> Option<&Expectation> {
        self.active.as_ref()
    }

    /// Whether an expectation is active.
    pub fn is_waiting(&self) -> bool {
        self.active.is_some()
    }
}

/// Guard for the active expectation.
pub struct ActiveSlot<'a> {
    active: &'a mut Option<Expectation>,
}

impl Drop for ActiveSlot<'_> {
    fn drop(&mut self) {
        self.active.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expectation(timeout: Duration) -> Expectation {
        let now = Instant::now();
        Expectation {
            tags: vec!["prompt".to_string()],
            registered: now,
            deadline: now + timeout,
        }
    }

    #[tokio::test]
    async fn test_queues_are_independent() {
        let mut queue = ExpectQueue::new();
        let mut other = ExpectQueue::new();

        let slot = queue.claim(expectation(Duration::from_secs(3))).unwrap();
        drop(slot);
        assert!(queue.active().is_none());

        let _slot = queue.claim(expectation(Duration::from_secs(3))).unwrap();

        // Queues are independent per channel
        assert!(other.claim(expectation(Duration::from_secs(1))).is_ok());
    }

    #[test]
    fn test_claim_after_leaked_slot_is_refused() {
        let mut queue = ExpectQueue::new();
        let slot = queue.claim(expectation(Duration::from_secs(3))).unwrap();
        std::mem::forget(slot);
        assert!(queue.is_waiting());
        assert_eq!(
            queue.active().map(Expectation::timeout),
            Some(Duration::from_secs(3))
        );
        assert!(matches!(
            queue.claim(expectation(Duration::from_secs(1))),
            Err(ChannelError::ExpectationActive)
        ));
    }

    #[tokio::test]
    async fn test_slot_clears_on_drop() {
        let mut queue = ExpectQueue::new();
        {
            let _slot = queue.claim(expectation(Duration::from_secs(1))).unwrap();
        }
        assert!(queue.active().is_none());
        assert!(queue.claim(expectation(Duration::from_secs(1))).is_ok());
    }
}
