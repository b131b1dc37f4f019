//! Device settings and the resolved, immutable device configuration.

use std::time::Duration;

use indexmap::IndexMap;
use log::debug;
use secrecy::SecretString;
use serde::Deserialize;

use super::hooks::{Hook, HookPolicy, process_hooks};
use crate::channel::Pattern;
use crate::error::ConfigError;

/// Partial, user-supplied device settings.
///
/// Every key is optional; missing keys are filled from a defaults value and
/// derivation hooks by [`merge`]. Timeouts deserialize from seconds.
///
/// # Example
///
/// ```rust
/// use telexpect::device::DeviceSettings;
///
/// let settings = DeviceSettings::new()
///     .id("core-sw1")
///     .address("10.0.0.1")
///     .username("admin")
///     .password("p4ss")
///     .enable_password("s3kr1t");
/// let config = settings.into_config().unwrap();
/// assert_eq!(config.port, 23);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceSettings {
    /// Identifier of the device, used in messages and to derive prompts.
    pub id: Option<String>,
    /// Host name or IP address.
    pub address: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    /// Login password, deserialized through `secrecy`'s serde support.
    pub password: Option<SecretString>,
    pub enable_password: Option<SecretString>,
    /// Unprivileged prompt pattern.
    pub prompt: Option<String>,
    /// Privileged prompt pattern, including configuration sub-modes.
    pub enabled_prompt: Option<String>,
    pub username_prompt: Option<String>,
    pub password_prompt: Option<String>,
    pub enable_password_prompt: Option<String>,
    pub enable_command: Option<String>,
    /// Command written by `exit`; empty means close without one.
    pub logout_command: Option<String>,
    /// Output patterns that mean the login was rejected.
    pub login_failure_patterns: Option<Vec<String>>,
    pub disable_paging: Option<bool>,
    pub disable_paging_command: Option<String>,
    #[serde(deserialize_with = "duration_secs::deserialize")]
    pub connect_timeout: Option<Duration>,
    #[serde(deserialize_with = "duration_secs::deserialize")]
    pub login_timeout: Option<Duration>,
    #[serde(deserialize_with = "duration_secs::deserialize")]
    pub command_timeout: Option<Duration>,
    pub line_terminator: Option<String>,
    /// Whether the device echoes commands back.
    pub echo: Option<bool>,
    pub strip_ansi: Option<bool>,
    /// Keep every received byte for inspection.
    pub keep_transcript: Option<bool>,
    /// Additional named patterns.
    pub patterns: IndexMap<String, String>,
}

macro_rules! setter {
    ($(#[$doc:meta])* $name:ident: String) => {
        $(#[$doc])*
        pub fn $name(mut self, value: impl Into<String>) -> Self {
            self.$name = Some(value.into());
            self
        }
    };
    ($(#[$doc:meta])* $name:ident: $ty:ty) => {
        $(#[$doc])*
        pub fn $name(mut self, value: $ty) -> Self {
            self.$name = Some(value);
            self
        }
    };
}

impl DeviceSettings {
    /// Create empty settings.
    pub fn new() -> Self {
        Self::default()
    }

    setter!(/// Set the device identifier.
        id: String);
    setter!(/// Set the address to connect to.
        address: String);
    setter!(/// Set the port.
        port: u16);
    setter!(/// Set the login username.
        username: String);
    setter!(/// Set the unprivileged prompt pattern.
        prompt: String);
    setter!(/// Set the privileged prompt pattern.
        enabled_prompt: String);
    setter!(/// Set the username prompt pattern.
        username_prompt: String);
    setter!(/// Set the password prompt pattern.
        password_prompt: String);
    setter!(/// Set the enable password prompt pattern.
        enable_password_prompt: String);
    setter!(/// Set the privilege escalation command.
        enable_command: String);
    setter!(/// Set the logout command.
        logout_command: String);
    setter!(/// Set whether paging is disabled after login.
        disable_paging: bool);
    setter!(/// Set the command that disables paging.
        disable_paging_command: String);
    setter!(/// Set the connect timeout.
        connect_timeout: Duration);
    setter!(/// Set the login timeout.
        login_timeout: Duration);
    setter!(/// Set the per-command timeout.
        command_timeout: Duration);
    setter!(/// Set the line terminator written after commands.
        line_terminator: String);
    setter!(/// Set whether the device echoes commands.
        echo: bool);
    setter!(/// Set whether ANSI escape sequences are stripped.
        strip_ansi: bool);
    setter!(/// Set whether a transcript of received text is kept.
        keep_transcript: bool);

    /// Set the login password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set the enable password.
    pub fn enable_password(mut self, password: impl Into<String>) -> Self {
        self.enable_password = Some(SecretString::from(password.into()));
        self
    }

    /// Add a login failure pattern.
    pub fn login_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.login_failure_patterns
            .get_or_insert_with(Vec::new)
            .push(pattern.into());
        self
    }

    /// Register a named pattern.
    pub fn pattern(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.patterns.insert(name.into(), pattern.into());
        self
    }

    /// Fill unset keys from `defaults`. Named patterns from both are kept,
    /// ours taking precedence.
    pub fn or_defaults(self, defaults: &DeviceSettings) -> Self {
        let user = self;
        let mut patterns = defaults.patterns.clone();
        patterns.extend(user.patterns);

        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                DeviceSettings {
                    $($field: user.$field.or_else(|| defaults.$field.clone()),)*
                    patterns,
                }
            };
        }

        overlay!(
            id,
            address,
            port,
            username,
            password,
            enable_password,
            prompt,
            enabled_prompt,
            username_prompt,
            password_prompt,
            enable_password_prompt,
            enable_command,
            logout_command,
            login_failure_patterns,
            disable_paging,
            disable_paging_command,
            connect_timeout,
            login_timeout,
            command_timeout,
            line_terminator,
            echo,
            strip_ansi,
            keep_transcript,
        )
    }

    /// Resolve with the IOS-style defaults and hooks.
    pub fn into_config(self) -> Result<DeviceConfig, ConfigError> {
        merge(self, &super::ios::defaults(), &super::ios::ios_hooks())
    }
}

/// Resolved device configuration.
///
/// Immutable once built; share it between sessions with an `Arc`.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Identifier used in messages (the address when no id was given).
    pub id: String,
    pub address: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: SecretString,
    pub enable_password: Option<SecretString>,
    pub prompt: Pattern,
    pub enabled_prompt: Pattern,
    pub username_prompt: Pattern,
    pub password_prompt: Pattern,
    pub enable_password_prompt: Pattern,
    pub login_failure: Vec<Pattern>,
    pub enable_command: String,
    pub logout_command: Option<String>,
    /// Command run after login to disable paging, if enabled.
    pub disable_paging: Option<String>,
    pub connect_timeout: Duration,
    pub login_timeout: Duration,
    pub command_timeout: Duration,
    pub line_terminator: String,
    pub echo: bool,
    pub strip_ansi: bool,
    pub keep_transcript: bool,
    patterns: IndexMap<String, Pattern>,
}

impl DeviceConfig {
    /// Look up a named pattern.
    pub fn pattern(&self, name: &str) -> Option<&Pattern> {
        self.patterns.get(name)
    }

    /// All named patterns, in registration order.
    pub fn patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.values()
    }

    /// Validate fully merged settings and compile their patterns.
    fn from_settings(settings: DeviceSettings) -> Result<Self, ConfigError> {
        let address = require(settings.address, "address")?;
        let disable_paging = if require(settings.disable_paging, "disable_paging")? {
            Some(require(
                settings.disable_paging_command,
                "disable_paging_command",
            )?)
        } else {
            None
        };

        let login_failure = settings
            .login_failure_patterns
            .unwrap_or_default()
            .iter()
            .map(|p| regex("login_failure_patterns", p))
            .collect::<Result<Vec<_>, _>>()?;

        let patterns = settings
            .patterns
            .iter()
            .map(|(name, p)| Ok((name.clone(), regex(name, p)?)))
            .collect::<Result<IndexMap<_, _>, ConfigError>>()?;

        Ok(Self {
            id: settings.id.unwrap_or_else(|| address.clone()),
            address,
            port: require(settings.port, "port")?,
            username: settings.username,
            password: require(settings.password, "password")?,
            enable_password: settings.enable_password,
            prompt: prompt("prompt", settings.prompt)?,
            enabled_prompt: prompt("enabled_prompt", settings.enabled_prompt)?,
            username_prompt: prompt("username_prompt", settings.username_prompt)?,
            password_prompt: prompt("password_prompt", settings.password_prompt)?,
            enable_password_prompt: prompt(
                "enable_password_prompt",
                settings.enable_password_prompt,
            )?,
            login_failure,
            enable_command: require(settings.enable_command, "enable_command")?,
            logout_command: settings.logout_command.filter(|c| !c.trim().is_empty()),
            disable_paging,
            connect_timeout: require(settings.connect_timeout, "connect_timeout")?,
            login_timeout: require(settings.login_timeout, "login_timeout")?,
            command_timeout: require(settings.command_timeout, "command_timeout")?,
            line_terminator: require(settings.line_terminator, "line_terminator")?,
            echo: require(settings.echo, "echo")?,
            strip_ansi: require(settings.strip_ansi, "strip_ansi")?,
            keep_transcript: settings.keep_transcript.unwrap_or(false),
            patterns,
        })
    }
}

/// Build a [`DeviceConfig`] from user settings, a defaults value and an
/// ordered list of derivation hooks.
///
/// User values win over defaults. Hooks then fill keys that are still unset
/// (strictly: a failing hook fails the merge). Finally required keys are
/// checked and every pattern is compiled.
pub fn merge(
    user: DeviceSettings,
    defaults: &DeviceSettings,
    hooks: &[Hook],
) -> Result<DeviceConfig, ConfigError> {
    let mut settings = user.or_defaults(defaults);
    process_hooks(&mut settings, hooks, HookPolicy::default())?;
    let config = DeviceConfig::from_settings(settings)?;
    debug!("resolved configuration for {}", config.id);
    Ok(config)
}

fn require<T>(value: Option<T>, key: &'static str) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::Missing(key))
}

fn prompt(key: &'static str, value: Option<String>) -> Result<Pattern, ConfigError> {
    let source = require(value, key)?;
    Pattern::prompt(key, &source).map_err(|source| ConfigError::InvalidPattern {
        field: key.to_string(),
        source,
    })
}

fn regex(key: &str, source: &str) -> Result<Pattern, ConfigError> {
    Pattern::regex(key, source).map_err(|source| ConfigError::InvalidPattern {
        field: key.to_string(),
        source,
    })
}

/// Serde helper for optional durations given in (fractional) seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        secs.map(|s| Duration::try_from_secs_f64(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
