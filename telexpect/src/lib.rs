//! # Telexpect
//!
//! Async prompt-matching session engine for CLI network devices.
//!
//! Telexpect drives an interactive command-line session over a plain text
//! stream (telnet-style TCP, or an SSH shell): it logs in by answering
//! username and password prompts, escalates privilege with `enable`, runs
//! commands and returns their output with the echo and prompt removed.
//!
//! ## Features
//!
//! - Async transports over TCP or russh shell channels
//! - Earliest-match pattern waits over arbitrarily chunked input
//! - Layered device configuration: user values, defaults, derivation hooks
//! - Typed errors for timeouts, lost connections, rejected credentials,
//!   failed escalation and device-reported command errors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use telexpect::{DeviceSettings, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), telexpect::Error> {
//!     let config = DeviceSettings::new()
//!         .id("router1")
//!         .address("192.0.2.1")
//!         .username("admin")
//!         .password("secret")
//!         .enable_password("secret")
//!         .into_config()?;
//!
//!     let mut session = Session::connect(Arc::new(config)).await?;
//!     session.login().await?;
//!     session.enable().await?;
//!
//!     let response = session.run_command("show version").await?;
//!     println!("{}", response.result);
//!
//!     session.exit().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod device;
pub mod error;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use device::{DeviceConfig, DeviceSettings};
pub use error::{Error, ErrorKind, Result};
pub use session::{CommandOptions, Response, Session, SessionState, SharedSession};
pub use transport::{AuthMethod, SshConfig, SshTransport, TcpTransport, Transport};
