//! Per-command options.

use std::time::Duration;

use crate::channel::Pattern;

/// Options for [`Session::run_command_with`](super::Session::run_command_with).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use telexpect::channel::Pattern;
/// use telexpect::session::CommandOptions;
///
/// let options = CommandOptions::new()
///     .with_prompt(Pattern::regex("confirm", r"\[confirm\]").unwrap())
///     .with_timeout(Duration::from_secs(30))
///     .with_check_errors(false);
/// ```
#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// Pattern ending the output instead of the current privilege level's
    /// prompt.
    pub prompt: Option<Pattern>,

    /// Timeout instead of the configured command timeout.
    pub timeout: Option<Duration>,

    /// Remove the echoed command from the output.
    pub strip_command: bool,

    /// Remove the trailing prompt from the output.
    pub strip_prompt: bool,

    /// Report `%` error lines as a device error.
    pub check_errors: bool,

    /// Treat a closed connection as the end of the output.
    pub may_disconnect: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            prompt: None,
            timeout: None,
            strip_command: true,
            strip_prompt: true,
            check_errors: true,
            may_disconnect: false,
        }
    }
}

impl CommandOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for `prompt` instead of the privilege level's prompt.
    pub fn with_prompt(mut self, prompt: Pattern) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Override the command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set whether the echoed command is removed.
    pub fn with_strip_command(mut self, strip: bool) -> Self {
        self.strip_command = strip;
        self
    }

    /// Set whether the trailing prompt is removed.
    pub fn with_strip_prompt(mut self, strip: bool) -> Self {
        self.strip_prompt = strip;
        self
    }

    /// Set whether device error lines fail the command.
    pub fn with_check_errors(mut self, check: bool) -> Self {
        self.check_errors = check;
        self
    }

    /// Set whether the command may close the connection.
    pub fn with_may_disconnect(mut self, may_disconnect: bool) -> Self {
        self.may_disconnect = may_disconnect;
        self
    }
}
