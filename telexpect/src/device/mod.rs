//! Device configuration.
//!
//! [`DeviceSettings`] holds what a user supplies, [`DeviceConfig`] what a
//! session runs with. [`merge`] builds one from the other using an explicit
//! defaults value (see [`ios::defaults`]) and derivation [`hooks`].

mod config;
pub mod hooks;
pub mod ios;

pub use config::{DeviceConfig, DeviceSettings, merge};
pub use hooks::{Field, Hook, HookPolicy, process_hooks};
