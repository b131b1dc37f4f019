//! Session state machine: login, privilege escalation, commands and exit.
//!
//! A [`Session`] binds one transport to one [`DeviceConfig`]. Operations
//! take `&mut self`, so a session runs one operation at a time; use
//! [`SharedSession`] to hand a session to several tasks.

mod options;
mod output;
mod response;
mod shared;

pub use options::CommandOptions;
pub use output::{CARET_MARKER, DeviceError, find_device_error, normalize_newlines};
pub use response::Response;
pub use shared::SharedSession;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;

use crate::channel::{Channel, Matched, Pattern};
use crate::device::DeviceConfig;
use crate::error::{ChannelError, Error, Result, SessionError, Violation};
use crate::transport::{TcpTransport, Transport};

/// Which credential the device is being given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Username,
    Password,
}

/// Privilege level of a logged-in session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Unprivileged EXEC mode (`host>`).
    User,
    /// Privileged EXEC mode (`host#`).
    Enabled,
}

impl Privilege {
    fn state(self) -> SessionState {
        match self {
            Privilege::User => SessionState::LoggedIn,
            Privilege::Enabled => SessionState::Enabled,
        }
    }
}

/// State of a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Transport open, not logged in.
    Connected,
    /// Login in progress.
    Authenticating(AuthStage),
    /// At the unprivileged prompt.
    LoggedIn,
    /// `enable` in progress.
    Escalating,
    /// At the privileged prompt.
    Enabled,
    /// A command is running.
    Running { command: String, level: Privilege },
    /// Transport closed; only inspection remains possible.
    Disconnected,
}

impl SessionState {
    /// The stable state an operation interrupted in this state falls back to.
    pub fn settled(&self) -> SessionState {
        match self {
            SessionState::Authenticating(_) => SessionState::Connected,
            SessionState::Escalating => SessionState::LoggedIn,
            SessionState::Running { level, .. } => level.state(),
            other => other.clone(),
        }
    }

    /// Privilege level, when logged in.
    pub fn privilege(&self) -> Option<Privilege> {
        match self {
            SessionState::LoggedIn => Some(Privilege::User),
            SessionState::Enabled => Some(Privilege::Enabled),
            SessionState::Running { level, .. } => Some(*level),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connected => f.write_str("connected"),
            SessionState::Authenticating(AuthStage::Username) => {
                f.write_str("authenticating (username)")
            }
            SessionState::Authenticating(AuthStage::Password) => {
                f.write_str("authenticating (password)")
            }
            SessionState::LoggedIn => f.write_str("logged in"),
            SessionState::Escalating => f.write_str("escalating"),
            SessionState::Enabled => f.write_str("enabled"),
            SessionState::Running { command, .. } => write!(f, "running '{}'", command),
            SessionState::Disconnected => f.write_str("disconnected"),
        }
    }
}

/// The step an error is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Login,
    Enable,
    Command(String),
    /// Waiting for the first prompt on a pre-authenticated transport.
    Prompt,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Login => f.write_str("login"),
            Step::Enable => f.write_str("enable"),
            Step::Command(command) => write!(f, "command '{}'", command),
            Step::Prompt => f.write_str("prompt"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginKey {
    Username,
    Password,
    Prompt(Privilege),
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnableKey {
    Password,
    Enabled,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Echo,
    Prompt,
}

/// A live session with one device.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use telexpect::{DeviceSettings, Session};
///
/// # async fn example() -> Result<(), telexpect::Error> {
/// let config = DeviceSettings::new()
///     .id("sw1")
///     .address("192.0.2.1")
///     .username("admin")
///     .password("p4ss")
///     .enable_password("s3kr1t")
///     .into_config()?;
///
/// let mut session = Session::connect(Arc::new(config)).await?;
/// session.login().await?;
/// session.enable().await?;
/// let response = session.run_command("show clock").await?;
/// println!("{}", response.result);
/// session.exit().await?;
/// # Ok(())
/// # }
/// ```
pub struct Session<T> {
    channel: Channel<T>,
    config: Arc<DeviceConfig>,
    state: SessionState,
}

impl Session<TcpTransport> {
    /// Connect over TCP to the configured address and port.
    pub async fn connect(config: Arc<DeviceConfig>) -> Result<Self> {
        let transport =
            TcpTransport::connect(&config.address, config.port, config.connect_timeout).await?;
        Ok(Self::new(transport, config))
    }
}

impl<T: Transport> Session<T> {
    /// Start a session on an open transport.
    pub fn new(transport: T, config: Arc<DeviceConfig>) -> Self {
        let channel = Channel::new(transport, config.strip_ansi, config.keep_transcript);
        Self {
            channel,
            config,
            state: SessionState::Connected,
        }
    }

    /// The current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The device configuration.
    pub fn config(&self) -> &Arc<DeviceConfig> {
        &self.config
    }

    /// Everything received so far, if `keep_transcript` is set.
    pub fn transcript(&self) -> Option<Cow<'_, str>> {
        self.channel.transcript()
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        self.channel.transport()
    }

    /// Log in with the configured credentials.
    ///
    /// Waits for the username prompt (only when a username is configured),
    /// then the password prompt, then the unprivileged or privileged
    /// prompt. A login failure message, a repeated credential prompt or
    /// no prompt at all after the password fail with
    /// [`SessionError::Authentication`]. Disables paging afterwards when
    /// configured; a device refusing that is only logged, the login still
    /// succeeds unless the connection was lost.
    pub async fn login(&mut self) -> Result<()> {
        self.recover();
        if self.state != SessionState::Connected {
            return Err(self.invalid("login"));
        }

        let config = self.config.clone();
        debug!("{}: logging in", config.id);

        match self.authenticate(&config).await {
            Ok(level) => self.logged_in(level).await,
            Err(e) => {
                if self.state != SessionState::Disconnected {
                    self.state = SessionState::Connected;
                }
                Err(e)
            }
        }
    }

    /// Wait for a prompt on a transport that authenticated on its own,
    /// such as an SSH shell.
    pub async fn await_prompt(&mut self) -> Result<()> {
        self.recover();
        if self.state != SessionState::Connected {
            return Err(self.invalid("await_prompt"));
        }

        let config = self.config.clone();
        let expectations = [
            (Privilege::User, &config.prompt),
            (Privilege::Enabled, &config.enabled_prompt),
        ];
        match self.channel.wait_for(&expectations, config.login_timeout).await {
            Ok(matched) => self.logged_in(matched.key).await,
            Err(e) => Err(self.fail(Step::Prompt, e)),
        }
    }

    /// Enter privileged mode.
    ///
    /// Only valid when logged in and unprivileged. Fails fast with
    /// [`SessionError::Escalation`] when no enable password is configured.
    /// On failure the session stays logged in at the unprivileged level.
    pub async fn enable(&mut self) -> Result<()> {
        self.recover();
        if self.state != SessionState::LoggedIn {
            return Err(self.invalid("enable"));
        }

        let config = self.config.clone();
        let Some(secret) = config.enable_password.as_ref() else {
            return Err(self.escalation_failed("no enable password configured"));
        };

        self.state = SessionState::Escalating;
        debug!("{}: entering privileged mode", config.id);

        let result = self.escalate(&config, secret).await;
        match &result {
            Ok(()) => {
                self.state = SessionState::Enabled;
                debug!("{}: privileged mode entered", config.id);
            }
            Err(_) if self.state != SessionState::Disconnected => {
                self.state = SessionState::LoggedIn;
            }
            Err(_) => {}
        }
        result
    }

    /// Run a command with default options.
    pub async fn run_command(&mut self, command: &str) -> Result<Response> {
        self.run_command_with(command, CommandOptions::default())
            .await
    }

    /// Run a command.
    ///
    /// Writes the command and the line terminator, consumes the device's
    /// echo of it, then collects output up to the prompt of the current
    /// privilege level. With `echo` configured, text before the echo is
    /// dropped and the prompt is only looked for after it. The whole
    /// exchange shares one deadline.
    pub async fn run_command_with(
        &mut self,
        command: &str,
        options: CommandOptions,
    ) -> Result<Response> {
        self.recover();
        let Some(level) = self.state.privilege() else {
            return Err(self.invalid("run_command"));
        };

        let command = command.trim();
        let config = self.config.clone();
        let prompt = options.prompt.as_ref().unwrap_or(match level {
            Privilege::User => &config.prompt,
            Privilege::Enabled => &config.enabled_prompt,
        });
        let timeout = options.timeout.unwrap_or(config.command_timeout);

        self.state = SessionState::Running {
            command: command.to_string(),
            level,
        };
        debug!("{}: running '{}'", config.id, command);

        let result = self
            .execute(&config, command, prompt, timeout, &options)
            .await;
        if matches!(self.state, SessionState::Running { .. }) {
            self.state = level.state();
        }
        result
    }

    /// Log out and close the connection.
    ///
    /// Writes the logout command when logged in and one is configured,
    /// allowing the device to close the connection in response, then
    /// closes the transport. Problems during logout are logged, not
    /// returned: the session always ends up disconnected.
    pub async fn exit(&mut self) -> Result<()> {
        self.recover();
        if self.state == SessionState::Disconnected {
            return Err(self.invalid("exit"));
        }

        let config = self.config.clone();
        if let (Some(logout), Some(_)) = (&config.logout_command, self.state.privilege()) {
            let options = CommandOptions::new()
                .with_may_disconnect(true)
                .with_check_errors(false);
            if let Err(e) = self.run_command_with(logout, options).await {
                warn!("{}: logout did not complete cleanly: {}", config.id, e);
            }
        }

        self.close().await
    }

    /// Close the connection without logging out.
    pub async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.channel.close().await {
            warn!("{}: error closing transport: {}", self.config.id, e);
        }
        self.disconnected();
        Ok(())
    }

    async fn authenticate(&mut self, config: &DeviceConfig) -> Result<Privilege> {
        let timeout = config.login_timeout;
        let mut password_requested = false;

        if let Some(username) = &config.username {
            self.state = SessionState::Authenticating(AuthStage::Username);
            let expectations = [
                (LoginKey::Username, &config.username_prompt),
                (LoginKey::Password, &config.password_prompt),
            ];
            let matched = match self.channel.wait_for(&expectations, timeout).await {
                Ok(matched) => matched,
                Err(e) => return Err(self.fail(Step::Login, e)),
            };
            if matched.key == LoginKey::Username {
                trace!("{}: sending username", config.id);
                if let Err(e) = self.channel.send_line(username, &config.line_terminator).await {
                    return Err(self.fail(Step::Login, e));
                }
            } else {
                debug!("{}: password requested first, skipping username", config.id);
                password_requested = true;
            }
        }

        self.state = SessionState::Authenticating(AuthStage::Password);
        if !password_requested {
            let expectations = [(LoginKey::Password, &config.password_prompt)];
            if let Err(e) = self.channel.wait_for(&expectations, timeout).await {
                return Err(self.fail(Step::Login, e));
            }
        }
        self.send_secret(Step::Login, &config.password).await?;

        let mut expectations = vec![
            (LoginKey::Prompt(Privilege::User), &config.prompt),
            (LoginKey::Prompt(Privilege::Enabled), &config.enabled_prompt),
        ];
        expectations.extend(config.login_failure.iter().map(|p| (LoginKey::Rejected, p)));
        if config.username.is_some() {
            expectations.push((LoginKey::Rejected, &config.username_prompt));
        }
        expectations.push((LoginKey::Rejected, &config.password_prompt));

        match self.channel.wait_for(&expectations, timeout).await {
            Ok(Matched {
                key: LoginKey::Prompt(level),
                ..
            }) => Ok(level),
            Ok(matched) => {
                let reason = if matched.tag.starts_with("login_failure") {
                    matched.matched.trim().to_string()
                } else {
                    format!("credentials requested again ({})", matched.tag)
                };
                Err(self.authentication_failed(reason))
            }
            Err(ChannelError::PatternTimeout { after, .. }) => Err(self.authentication_failed(
                format!("no prompt within {:?} after sending the password", after),
            )),
            Err(e) => Err(self.fail(Step::Login, e)),
        }
    }

    async fn logged_in(&mut self, level: Privilege) -> Result<()> {
        self.state = level.state();
        debug!("{}: logged in ({})", self.config.id, self.state);

        let config = self.config.clone();
        if let Some(command) = &config.disable_paging {
            match self.run_command(command).await {
                Ok(_) => {}
                Err(e) if self.state == SessionState::Disconnected => return Err(e),
                Err(e) => warn!("{}: could not disable paging: {}", config.id, e),
            }
        }
        Ok(())
    }

    async fn escalate(&mut self, config: &DeviceConfig, secret: &SecretString) -> Result<()> {
        let timeout = config.command_timeout;

        if let Err(e) = self
            .channel
            .send_line(&config.enable_command, &config.line_terminator)
            .await
        {
            return Err(self.fail(Step::Enable, e));
        }

        let expectations = [
            (EnableKey::Password, &config.enable_password_prompt),
            (EnableKey::Enabled, &config.enabled_prompt),
            (EnableKey::Denied, &config.prompt),
        ];
        let matched = match self.channel.wait_for(&expectations, timeout).await {
            Ok(matched) => matched,
            Err(e) => return Err(self.fail(Step::Enable, e)),
        };
        match matched.key {
            EnableKey::Enabled => return Ok(()),
            EnableKey::Denied => return Err(self.escalation_failed(denial_reason(&matched.before))),
            EnableKey::Password => {}
        }

        self.send_secret(Step::Enable, secret).await?;

        let expectations = [
            (EnableKey::Enabled, &config.enabled_prompt),
            (EnableKey::Password, &config.enable_password_prompt),
            (EnableKey::Denied, &config.prompt),
        ];
        match self.channel.wait_for(&expectations, timeout).await {
            Ok(matched) => match matched.key {
                EnableKey::Enabled => Ok(()),
                EnableKey::Password => {
                    self.leave_password_prompt(config).await;
                    Err(self.escalation_failed("enable password rejected"))
                }
                EnableKey::Denied => Err(self.escalation_failed(denial_reason(&matched.before))),
            },
            Err(ChannelError::PatternTimeout { after, .. }) => Err(self.escalation_failed(
                format!("no privileged prompt within {:?}", after),
            )),
            Err(e) => Err(self.fail(Step::Enable, e)),
        }
    }

    /// Answer a repeated enable password prompt with empty passwords until
    /// the device gives up and shows the unprivileged prompt again.
    async fn leave_password_prompt(&mut self, config: &DeviceConfig) {
        const ATTEMPTS: usize = 3;

        let expectations = [
            (true, &config.prompt),
            (false, &config.enable_password_prompt),
        ];
        for _ in 0..ATTEMPTS {
            let result = match self.channel.send_line("", &config.line_terminator).await {
                Ok(()) => self.channel.wait_for(&expectations, config.command_timeout).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(matched) if matched.key => return,
                Ok(_) => {}
                Err(e) => {
                    let err = self.fail(Step::Enable, e);
                    debug!("{}: could not return to the prompt: {}", config.id, err);
                    return;
                }
            }
        }
        warn!(
            "{}: still at the enable password prompt after {} attempts",
            config.id, ATTEMPTS
        );
    }

    async fn execute(
        &mut self,
        config: &DeviceConfig,
        command: &str,
        prompt: &Pattern,
        timeout: Duration,
        options: &CommandOptions,
    ) -> Result<Response> {
        let start = Instant::now();
        let deadline = start + timeout;
        let step = || Step::Command(command.to_string());

        if let Err(e) = self.channel.send_line(command, &config.line_terminator).await {
            return Err(self.fail(step(), e));
        }

        let echo = (config.echo && !command.is_empty()).then(|| Pattern::echo(command));
        let mut echoed = false;
        // The echo, then the output after it
        let mut head = String::new();
        let mut body = String::new();

        let prompt_text = loop {
            // Until the echo is seen nothing counts as output
            let expectations = match echo.as_ref().filter(|_| !echoed) {
                Some(echo) => [(Phase::Echo, echo)],
                None => [(Phase::Prompt, prompt)],
            };

            match self.channel.wait_until(&expectations, deadline).await {
                Ok(Matched {
                    key: Phase::Echo,
                    before,
                    matched,
                    ..
                }) => {
                    if !before.trim().is_empty() {
                        debug!("{}: dropping text received before the echo: {:?}", config.id, before);
                    }
                    trace!("{}: echo consumed", config.id);
                    head.push_str(&matched);
                    echoed = true;
                }
                Ok(Matched {
                    key: Phase::Prompt,
                    before,
                    matched,
                    ..
                }) => {
                    body.push_str(&before);
                    break matched;
                }
                Err(ChannelError::Closed { pending }) if options.may_disconnect => {
                    debug!("{}: connection closed by '{}'", config.id, command);
                    body.push_str(&pending);
                    self.disconnected();
                    break String::new();
                }
                Err(e) => return Err(self.fail(step(), e)),
            }
        };

        let raw_result = format!("{}{}{}", head, body, prompt_text);

        let mut text = String::new();
        if !options.strip_command {
            text.push_str(&head);
        }
        text.push_str(&body);
        if !options.strip_prompt {
            text.push_str(&prompt_text);
        }
        let mut result = output::clean(&text);
        if options.strip_command && !echoed {
            result = output::strip_command_line(&result, command).to_string();
        }

        if options.check_errors {
            if let Some(found) = output::find_device_error(&result) {
                let error = if found.error.contains(CARET_MARKER) {
                    format!("{}\n{}", command, found.error)
                } else {
                    found.error
                };
                debug!("{}: '{}' reported: {}", config.id, command, error);
                return Err(SessionError::DeviceReported {
                    device: config.id.clone(),
                    command: command.to_string(),
                    error,
                    output: found.remainder,
                }
                .into());
            }
        }

        Ok(Response::new(
            command,
            result,
            raw_result,
            prompt_text.trim(),
            start.elapsed(),
        ))
    }

    async fn send_secret(&mut self, step: Step, secret: &SecretString) -> Result<()> {
        trace!("{}: sending <hidden>", self.config.id);
        match self
            .channel
            .send_line(secret.expose_secret(), &self.config.line_terminator)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(step, e)),
        }
    }

    /// Resume from the settled state if an earlier operation's future was
    /// dropped before completing.
    fn recover(&mut self) {
        let settled = self.state.settled();
        if settled != self.state {
            warn!(
                "{}: operation abandoned while {}, resuming as {}",
                self.config.id, self.state, settled
            );
            self.channel.discard();
            self.state = settled;
        }
    }

    fn disconnected(&mut self) {
        if self.state != SessionState::Disconnected {
            debug!("{}: disconnected", self.config.id);
            self.state = SessionState::Disconnected;
        }
    }

    /// Convert a channel failure during `step` into a session error.
    fn fail(&mut self, step: Step, err: ChannelError) -> Error {
        match err {
            ChannelError::PatternTimeout { after, pending } => {
                debug!("{}: timed out after {:?} during {}", self.config.id, after, step);
                SessionError::Timeout {
                    step,
                    after,
                    pending,
                }
                .into()
            }
            ChannelError::Closed { .. } => {
                self.disconnected();
                SessionError::Disconnected {
                    device: self.config.id.clone(),
                    step,
                }
                .into()
            }
            ChannelError::Transport(e) => {
                warn!("{}: transport failed during {}: {}", self.config.id, step, e);
                self.disconnected();
                Error::Transport(e)
            }
            e @ ChannelError::ExpectationActive => e.into(),
        }
    }

    fn invalid(&self, operation: &'static str) -> Error {
        Violation::InvalidState {
            operation,
            state: self.state.clone(),
        }
        .into()
    }

    fn authentication_failed(&self, reason: impl Into<String>) -> Error {
        SessionError::Authentication {
            device: self.config.id.clone(),
            reason: reason.into(),
        }
        .into()
    }

    fn escalation_failed(&self, reason: impl Into<String>) -> Error {
        SessionError::Escalation {
            device: self.config.id.clone(),
            reason: reason.into(),
        }
        .into()
    }
}

/// Why the device refused `enable`: its `%` message, if it printed one.
fn denial_reason(output: &str) -> String {
    let output = output::clean(output);
    output
        .lines()
        .find(|line| line.starts_with('%'))
        .map(str::to_string)
        .unwrap_or_else(|| "device returned to the unprivileged prompt".to_string())
}
