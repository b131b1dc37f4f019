//! Settings for opening an SSH shell to a device.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// How an unknown or changed server key is treated (OpenSSH's
/// `StrictHostKeyChecking`).
#[derive(Debug, Clone, Default)]
pub enum HostKeyVerification {
    /// Only hosts already listed in known_hosts are accepted.
    Strict,

    /// Record keys of new hosts; refuse keys that changed.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For lab use only.
    Disabled,
}

/// Where and how to open the SSH shell.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Hostname or address.
    pub host: String,

    /// Port, 22 unless set.
    pub port: u16,

    /// SSH user.
    pub username: String,

    /// Credentials.
    pub auth: AuthMethod,

    /// Limit on connecting and authenticating.
    pub timeout: Duration,

    /// Terminal width for the PTY.
    pub terminal_width: u32,

    /// Terminal height for the PTY.
    pub terminal_height: u32,

    /// Server key policy.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file, `~/.ssh/known_hosts` when unset.
    pub known_hosts_path: Option<PathBuf>,
}

impl SshConfig {
    /// Create a configuration with default port, timeout and terminal size.
    pub fn new(host: impl Into<String>, username: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: username.into(),
            auth,
            timeout: Duration::from_secs(10),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the PTY dimensions.
    pub fn with_terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Set the host key verification mode.
    pub fn with_host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Use a custom known_hosts file.
    pub fn with_known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// `host:port`, for log and error messages.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// How the SSH layer authenticates.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// No authentication; the device prompts for credentials in the shell.
    None,

    /// Password.
    Password(SecretString),

    /// Key file.
    PrivateKey {
        /// Location of the key.
        path: PathBuf,
        /// Passphrase, if the key is encrypted.
        passphrase: Option<SecretString>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_setters() {
        let config = SshConfig::new("10.0.0.1", "admin", AuthMethod::Password("secret".into()))
            .with_port(2222)
            .with_host_key_verification(HostKeyVerification::Disabled);

        assert_eq!(config.socket_addr(), "10.0.0.1:2222");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(matches!(
            config.host_key_verification,
            HostKeyVerification::Disabled
        ));
    }

    #[test]
    fn test_password_is_redacted_in_debug() {
        let config = SshConfig::new("r1", "admin", AuthMethod::Password("hunter2".into()));
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
