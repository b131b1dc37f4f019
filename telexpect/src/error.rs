//! Error types for telexpect.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::session::{SessionState, Step};

/// Main error type for telexpect operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors (connect, read, write, close)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel errors (pattern waits, buffer)
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Session-level errors (login, enable, commands)
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Device configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The connection failed or was closed while an operation was pending.
    Connection,
    /// No expected pattern arrived before the deadline.
    Timeout,
    /// The device rejected the login credentials.
    Authentication,
    /// Privilege escalation failed or is not configured.
    Escalation,
    /// An operation was issued while another was pending, or in the wrong state.
    ProtocolViolation,
    /// The device reported an error for a command.
    Device,
    /// The device configuration is invalid or incomplete.
    Config,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(TransportError::Timeout(_)) => ErrorKind::Timeout,
            Error::Transport(TransportError::AuthenticationFailed { .. }) => {
                ErrorKind::Authentication
            }
            Error::Transport(_) => ErrorKind::Connection,
            Error::Channel(ChannelError::PatternTimeout { .. }) => ErrorKind::Timeout,
            Error::Channel(ChannelError::ExpectationActive) => ErrorKind::ProtocolViolation,
            Error::Channel(_) => ErrorKind::Connection,
            Error::Session(err) => err.kind(),
            Error::Config(_) => ErrorKind::Config,
        }
    }
}

/// Transport layer errors (TCP/SSH connection, raw I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// SSH authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host is not present in known_hosts (strict verification)
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key does not match the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// The connection is already closed
    #[error("Connection disconnected")]
    Disconnected,

    /// Connecting timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (expectations against the stream).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// No pattern matched before the deadline
    #[error("Pattern not found within {after:?}")]
    PatternTimeout {
        after: Duration,
        /// Unconsumed text at the time of the timeout.
        pending: String,
    },

    /// The transport closed while waiting
    #[error("Channel closed")]
    Closed {
        /// Unconsumed text at the time the transport closed.
        pending: String,
    },

    /// A second expectation was registered while one is active.
    ///
    /// `Channel` borrows its queue for the whole wait, so this only happens
    /// after a slot guard was leaked with `mem::forget`.
    #[error("An expectation is already active on this channel")]
    ExpectationActive,

    /// The transport failed while waiting or writing
    #[error("Channel transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Why an operation was refused by the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Another operation holds the session.
    #[error("'{operation}' issued while another operation is pending")]
    Busy { operation: &'static str },

    /// The operation is not valid in the current state.
    #[error("'{operation}' is not valid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

}

/// Session layer errors (login, enable, command execution).
#[derive(Error, Debug)]
pub enum SessionError {
    /// The connection was lost while an operation was pending
    #[error("Connection to {device} lost during {step}")]
    Disconnected { device: String, step: Step },

    /// The expected prompt did not arrive in time
    #[error("Timed out after {after:?} during {step}")]
    Timeout {
        step: Step,
        after: Duration,
        /// Unconsumed text at the time of the timeout.
        pending: String,
    },

    /// Login was rejected
    #[error("Authentication failed on {device}: {reason}")]
    Authentication { device: String, reason: String },

    /// Entering privileged mode failed
    #[error("Failed to enter privileged mode on {device}: {reason}")]
    Escalation { device: String, reason: String },

    /// The caller broke the one-operation-at-a-time contract
    #[error("Protocol violation: {0}")]
    ProtocolViolation(Violation),

    /// The device printed an error in response to a command
    #[error("Device {device} reported an error for '{command}': {error}")]
    DeviceReported {
        device: String,
        command: String,
        error: String,
        /// Command output with the error lines removed.
        output: String,
    },
}

impl SessionError {
    fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Disconnected { .. } => ErrorKind::Connection,
            SessionError::Timeout { .. } => ErrorKind::Timeout,
            SessionError::Authentication { .. } => ErrorKind::Authentication,
            SessionError::Escalation { .. } => ErrorKind::Escalation,
            SessionError::ProtocolViolation(_) => ErrorKind::ProtocolViolation,
            SessionError::DeviceReported { .. } => ErrorKind::Device,
        }
    }
}

impl From<Violation> for Error {
    fn from(violation: Violation) -> Self {
        Error::Session(SessionError::ProtocolViolation(violation))
    }
}

/// Device configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required setting is absent after defaults and hooks
    #[error("Missing required setting '{0}'")]
    Missing(&'static str),

    /// A hook could not derive its value
    #[error("Cannot derive '{field}': {message}")]
    ImproperlyConfigured { field: String, message: String },

    /// A pattern setting is not a valid regular expression
    #[error("Invalid pattern for '{field}': {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },
}

/// Result type alias using telexpect's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err: Error = ChannelError::PatternTimeout {
            after: Duration::from_secs(1),
            pending: String::new(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let err: Error = Violation::Busy {
            operation: "run_command",
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);

        let err: Error = ChannelError::ExpectationActive.into();
        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);

        let err: Error = TransportError::Disconnected.into();
        assert_eq!(err.kind(), ErrorKind::Connection);

        let err: Error = ConfigError::Missing("password").into();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_violation_display() {
        let violation = Violation::InvalidState {
            operation: "enable",
            state: SessionState::Connected,
        };
        assert_eq!(
            violation.to_string(),
            "'enable' is not valid in state connected"
        );
    }
}
