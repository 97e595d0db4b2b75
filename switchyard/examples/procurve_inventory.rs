//! Inventory example: connect to a ProCurve switch and print its details
//!
//! # Usage
//!
//! ```bash
//! cargo run --example procurve_inventory -- --host 10.0.0.2 --user manager --password secret
//! ```
//!
//! Set `RUST_LOG=debug` to see the raw connection traffic summaries.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use switchyard::{Device, DeviceSwitch, DriverBuilder, DriverRegistry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    println!("Connecting to {}:{}...", args.host, args.port);

    let mut builder = DriverBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .platform("procurve")
        .timeout(Duration::from_secs(args.timeout))
        .timeout_read(Duration::from_secs(args.timeout_read));

    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else if let Some(key_path) = &args.key {
        builder = builder.private_key(key_path);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }

    let registry = DriverRegistry::with_builtin();
    let session = builder.connect(&registry).await?;
    let switch = session.driver();
    let token = session.token().clone();

    // Drain any banner text that arrives after the first prompt.
    switch.flush_for(&token, Duration::from_millis(500)).await?;

    println!("{}", "-".repeat(50));
    println!("Name:     {}", switch.get_sysname(&token).await?);
    println!("Uptime:   {}", switch.get_uptime(&token).await?);
    println!("Version:  {}", switch.get_version(&token).await?.join(", "));
    println!("ROM:      {}", switch.get_version_rom(&token).await?.join(", "));
    println!("CPU:      {}%", switch.get_cpu(&token).await?);
    println!("Memory:   {}%", switch.get_ram(&token).await?);

    let serials = switch.get_serial_numbers(&token).await?;
    let models = switch.get_model_numbers(&token).await?;
    let names = switch.get_model_names(&token).await?;
    for (i, serial) in serials.iter().enumerate() {
        println!(
            "Member {}: {} {} ({})",
            i + 1,
            models.get(i).map(String::as_str).unwrap_or("?"),
            names.get(i).map(String::as_str).unwrap_or("?"),
            serial
        );
    }
    println!("{}", "-".repeat(50));

    if args.config {
        println!("{}", switch.get_running_config(&token).await?);
    }

    session.close().await?;
    Ok(())
}

/// Simple argument parser
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    timeout: u64,
    timeout_read: u64,
    config: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut port = 22u16;
        let mut user = "manager".to_string();
        let mut password = None;
        let mut key = None;
        let mut timeout = 30u64;
        let mut timeout_read = 5u64;
        let mut config = false;

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--host" | "-h" => {
                    if let Some(v) = value {
                        host = v;
                    }
                    i += 1;
                }
                "--port" | "-p" => {
                    port = value.and_then(|v| v.parse().ok()).unwrap_or(22);
                    i += 1;
                }
                "--user" | "-u" => {
                    if let Some(v) = value {
                        user = v;
                    }
                    i += 1;
                }
                "--password" | "-P" => {
                    password = value;
                    i += 1;
                }
                "--key" | "-k" => {
                    key = value.map(PathBuf::from);
                    i += 1;
                }
                "--timeout" | "-t" => {
                    timeout = value.and_then(|v| v.parse().ok()).unwrap_or(30);
                    i += 1;
                }
                "--read-timeout" => {
                    timeout_read = value.and_then(|v| v.parse().ok()).unwrap_or(5);
                    i += 1;
                }
                "--config" => config = true,
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                other => eprintln!("Unknown argument: {}", other),
            }
            i += 1;
        }

        Self {
            host,
            port,
            user,
            password,
            key,
            timeout,
            timeout_read,
            config,
        }
    }

    fn print_help() {
        println!(
            r#"switchyard procurve_inventory example

USAGE:
    cargo run --example procurve_inventory -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Switch address [default: localhost]
    -p, --port <PORT>        SSH port [default: 22]
    -u, --user <USER>        Username [default: manager]
    -P, --password <PASS>    Password for authentication
    -k, --key <PATH>         Path to SSH private key
    -t, --timeout <SECS>     Connection timeout [default: 30]
    --read-timeout <SECS>    Per-command read timeout [default: 5]
    --config                 Also print the running configuration
    --help                   Print this help message
"#
        );
    }
}
