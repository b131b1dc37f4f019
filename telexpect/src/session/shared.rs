//! A session handle shared between tasks.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use super::{CommandOptions, Response, Session, SessionState};
use crate::error::{Result, Violation};
use crate::transport::Transport;

/// Cloneable handle to a [`Session`].
///
/// Operations do not queue: issuing one while another is still pending
/// fails at once with a [`Violation::Busy`] protocol violation and leaves
/// the pending operation untouched.
pub struct SharedSession<T> {
    inner: Arc<Mutex<Session<T>>>,
}

impl<T> Clone for SharedSession<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Transport> SharedSession<T> {
    /// Share `session`.
    pub fn new(session: Session<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    fn acquire(&self, operation: &'static str) -> Result<MutexGuard<'_, Session<T>>> {
        self.inner
            .try_lock()
            .map_err(|_| Violation::Busy { operation }.into())
    }

    /// See [`Session::login`].
    pub async fn login(&self) -> Result<()> {
        let mut session = self.acquire("login")?;
        session.login().await
    }

    /// See [`Session::await_prompt`].
    pub async fn await_prompt(&self) -> Result<()> {
        let mut session = self.acquire("await_prompt")?;
        session.await_prompt().await
    }

    /// See [`Session::enable`].
    pub async fn enable(&self) -> Result<()> {
        let mut session = self.acquire("enable")?;
        session.enable().await
    }

    /// See [`Session::run_command`].
    pub async fn run_command(&self, command: &str) -> Result<Response> {
        let mut session = self.acquire("run_command")?;
        session.run_command(command).await
    }

    /// See [`Session::run_command_with`].
    pub async fn run_command_with(
        &self,
        command: &str,
        options: CommandOptions,
    ) -> Result<Response> {
        let mut session = self.acquire("run_command")?;
        session.run_command_with(command, options).await
    }

    /// See [`Session::exit`].
    pub async fn exit(&self) -> Result<()> {
        let mut session = self.acquire("exit")?;
        session.exit().await
    }

    /// The current state, or `None` while an operation is pending.
    pub fn state(&self) -> Option<SessionState> {
        self.inner
            .try_lock()
            .ok()
            .map(|session| session.state().clone())
    }

    /// Whether an operation is pending.
    pub fn is_busy(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    /// Wait for any pending operation and take the session exclusively.
    pub async fn lock(&self) -> MutexGuard<'_, Session<T>> {
        self.inner.lock().await
    }
}
