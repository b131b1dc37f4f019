//! Cisco IOS-style defaults.
//!
//! IOS devices reached over telnet ask for a username and password,
//! land at `host>`, escalate with `enable` to `host#` and report command
//! errors on lines starting with `%`.

use std::time::Duration;

use super::config::DeviceSettings;
use super::hooks::{Hook, enabled_prompt_from_id, prompt_from_id};

/// Default username prompt.
pub const USERNAME_PROMPT: &str = r"(?i)(?:user ?name|login):";

/// Default password prompt, for both login and `enable`.
pub const PASSWORD_PROMPT: &str = r"[Pp]assword:";

/// Default login failure messages.
pub const LOGIN_FAILURE: &str =
    r"(?i)%\s*(?:login invalid|authentication failed|bad (?:passwords?|secrets?)|access denied)";

/// The defaults value: every key a device does not usually need to set.
pub fn defaults() -> DeviceSettings {
    DeviceSettings {
        port: Some(23),
        connect_timeout: Some(Duration::from_secs(5)),
        login_timeout: Some(Duration::from_secs(10)),
        command_timeout: Some(Duration::from_secs(3)),
        line_terminator: Some("\r\n".to_string()),
        username_prompt: Some(USERNAME_PROMPT.to_string()),
        password_prompt: Some(PASSWORD_PROMPT.to_string()),
        enable_password_prompt: Some(PASSWORD_PROMPT.to_string()),
        login_failure_patterns: Some(vec![LOGIN_FAILURE.to_string()]),
        enable_command: Some("enable".to_string()),
        logout_command: Some("exit".to_string()),
        disable_paging: Some(false),
        disable_paging_command: Some("terminal length 0".to_string()),
        echo: Some(true),
        strip_ansi: Some(true),
        keep_transcript: Some(false),
        ..DeviceSettings::default()
    }
}

/// Hooks deriving both prompts from the device id.
pub fn ios_hooks() -> Vec<Hook> {
    vec![prompt_from_id(), enabled_prompt_from_id()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Pattern;

    #[test]
    fn test_defaults_leave_identity_unset() {
        let defaults = defaults();
        assert!(defaults.address.is_none());
        assert!(defaults.password.is_none());
        assert!(defaults.prompt.is_none());
        assert_eq!(defaults.port, Some(23));
    }

    #[test]
    fn test_default_prompts() {
        let username = Pattern::prompt("username_prompt", USERNAME_PROMPT).unwrap();
        assert!(username.is_match(b"\r\nUser Access Verification\r\n\r\nUsername: "));
        assert!(username.is_match(b"login: "));
        assert!(!username.is_match(b"Last login: Mon Jan 1\r\n"));

        let password = Pattern::prompt("password_prompt", PASSWORD_PROMPT).unwrap();
        assert!(password.is_match(b"Password: "));
        assert!(password.is_match(b"password:"));
    }

    #[test]
    fn test_login_failure_messages() {
        let failure = Pattern::regex("login_failure", LOGIN_FAILURE).unwrap();
        assert!(failure.is_match(b"% Login invalid\r\n"));
        assert!(failure.is_match(b"% Authentication failed"));
        assert!(failure.is_match(b"% Bad passwords"));
        assert!(!failure.is_match(b"% Invalid input detected at '^' marker."));
    }
}
