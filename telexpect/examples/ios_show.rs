//! Log in to an IOS-style device over telnet and run show commands.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example ios_show -- --host 192.0.2.1 --id router1 \
//!     --user admin --password secret --enable secret "show version" "show clock"
//! ```
//!
//! Set `RUST_LOG=telexpect=trace` to watch every prompt being matched.

use std::env;
use std::sync::Arc;

use telexpect::{DeviceSettings, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut settings = DeviceSettings::new()
        .id(&args.id)
        .address(&args.host)
        .port(args.port)
        .password(&args.password)
        .disable_paging(true);
    if let Some(user) = &args.user {
        settings = settings.username(user);
    }
    if let Some(enable) = &args.enable {
        settings = settings.enable_password(enable);
    }
    let config = Arc::new(settings.into_config()?);

    println!("Connecting to {}:{}...", config.address, config.port);
    let mut session = Session::connect(config).await?;
    session.login().await?;
    println!("Logged in ({})", session.state());

    if args.enable.is_some() {
        session.enable().await?;
        println!("Privileged mode entered");
    }

    for command in &args.commands {
        println!("\n{} {}", session.state(), command);
        println!("{}", "-".repeat(50));
        match session.run_command(command).await {
            Ok(response) => {
                println!("{}", response.result);
                println!("{}", "-".repeat(50));
                println!("Completed in {:?}", response.elapsed);
            }
            Err(e) => eprintln!("Command failed: {}", e),
        }
    }

    session.exit().await?;
    println!("\nDone!");
    Ok(())
}

struct Args {
    host: String,
    port: u16,
    id: String,
    user: Option<String>,
    password: String,
    enable: Option<String>,
    commands: Vec<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = env::args().skip(1);
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 23,
            id: "router".to_string(),
            user: None,
            password: String::new(),
            enable: None,
            commands: Vec::new(),
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => parsed.host = args.next().unwrap_or(parsed.host),
                "--port" | "-p" => {
                    parsed.port = args.next().and_then(|p| p.parse().ok()).unwrap_or(23)
                }
                "--id" => parsed.id = args.next().unwrap_or(parsed.id),
                "--user" | "-u" => parsed.user = args.next(),
                "--password" | "-P" => parsed.password = args.next().unwrap_or_default(),
                "--enable" | "-e" => parsed.enable = args.next(),
                _ => parsed.commands.push(arg),
            }
        }

        if parsed.commands.is_empty() {
            parsed.commands.push("show version".to_string());
        }
        parsed
    }
}
