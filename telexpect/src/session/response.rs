//! What a command produced.

use std::fmt;
use std::time::Duration;

/// Output of one [`Session::run_command`](super::Session::run_command).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The command as written, trimmed.
    pub command: String,

    /// Normalized output: `\n` line endings, surrounding blank lines
    /// removed, echo and prompt removed unless the options kept them.
    pub result: String,

    /// Exactly what arrived for the command, echo and prompt included.
    pub raw_result: String,

    /// The prompt that ended the output, trimmed. Empty when the device
    /// closed the connection instead.
    pub prompt: String,

    /// From writing the command to seeing the prompt.
    pub elapsed: Duration,
}

impl Response {
    pub fn new(
        command: impl Into<String>,
        result: impl Into<String>,
        raw_result: impl Into<String>,
        prompt: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            result: result.into(),
            raw_result: raw_result.into(),
            prompt: prompt.into(),
            elapsed,
        }
    }

    /// Whether the connection closed instead of a prompt ending the output.
    pub fn disconnected(&self) -> bool {
        self.prompt.is_empty()
    }

    /// Output lines.
    pub fn lines(&self) -> std::str::Lines<'_> {
        self.result.lines()
    }

    /// Whether the output mentions `text`.
    pub fn contains(&self, text: &str) -> bool {
        self.result.contains(text)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let response = Response::new(
            "show ip interface brief",
            "Interface  IP-Address\nGi0/1      10.0.0.1",
            "show ip interface brief\r\nInterface  IP-Address\r\nGi0/1      10.0.0.1\r\nr1#",
            "r1#",
            Duration::from_millis(40),
        );
        assert!(!response.disconnected());
        assert_eq!(response.lines().count(), 2);
        assert!(response.contains("10.0.0.1"));
        assert_eq!(response.to_string(), response.result);
    }

    #[test]
    fn test_disconnected_without_prompt() {
        let response = Response::new("reload", "", "reload\r\n", "", Duration::ZERO);
        assert!(response.disconnected());
    }
}
