//! Drive a CLI over an SSH shell channel.
//!
//! SSH authenticates before the shell starts, so the session waits for the
//! first prompt instead of answering login prompts.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example ssh_shell -- 192.0.2.1 switch1 admin secret "show clock"
//! ```

use std::env;
use std::sync::Arc;

use telexpect::transport::HostKeyVerification;
use telexpect::{AuthMethod, DeviceSettings, Session, SshConfig, SshTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let [host, id, user, password, command] = args.as_slice() else {
        eprintln!("usage: ssh_shell <host> <device-id> <user> <password> <command>");
        std::process::exit(2);
    };

    let config = Arc::new(
        DeviceSettings::new()
            .id(id)
            .address(host)
            .port(22)
            .password(password)
            .enable_password(password)
            .into_config()?,
    );

    let ssh = SshConfig::new(host, user, AuthMethod::Password(password.clone().into()))
        .with_host_key_verification(HostKeyVerification::AcceptNew);
    let transport = SshTransport::connect(ssh).await?;

    let mut session = Session::new(transport, config);
    session.await_prompt().await?;
    if session.state() == &telexpect::SessionState::LoggedIn {
        session.enable().await?;
    }

    let response = session.run_command(command).await?;
    println!("{}", response.result);

    session.exit().await?;
    Ok(())
}
