//! Run the same command on several devices at once.
//!
//! Each device gets its own session; sessions share nothing, so they run
//! concurrently on one runtime.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example concurrent_devices -- admin secret sw1=192.0.2.1 sw2=192.0.2.2
//! ```

use std::env;
use std::sync::Arc;

use telexpect::{DeviceSettings, Session};

async fn show_clock(settings: DeviceSettings) -> Result<String, telexpect::Error> {
    let config = Arc::new(settings.into_config()?);
    let mut session = Session::connect(config).await?;
    session.login().await?;
    let response = session.run_command("show clock").await?;
    session.exit().await?;
    Ok(response.result)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut args = env::args().skip(1);
    let (Some(user), Some(password)) = (args.next(), args.next()) else {
        eprintln!("usage: concurrent_devices <user> <password> <id=address>...");
        std::process::exit(2);
    };

    let mut tasks = Vec::new();
    for device in args {
        let Some((id, address)) = device.split_once('=') else {
            eprintln!("skipping '{}': expected id=address", device);
            continue;
        };
        let settings = DeviceSettings::new()
            .id(id)
            .address(address)
            .username(&user)
            .password(&password);
        let id = id.to_string();
        tasks.push(tokio::spawn(async move { (id, show_clock(settings).await) }));
    }

    for task in tasks {
        let (id, result) = task.await?;
        match result {
            Ok(clock) => println!("{:<12} {}", id, clock),
            Err(e) => println!("{:<12} failed ({:?}): {}", id, e.kind(), e),
        }
    }
    Ok(())
}
