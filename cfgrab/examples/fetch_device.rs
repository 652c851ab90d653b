//! Fetch one device's running configuration without an inventory
//!
//! # Usage
//!
//! ```bash
//! cargo run --example fetch_device -- --host 10.0.0.1 --user admin --password admin --model sonic
//! ```
//!
//! Over REST, with an explicit endpoint:
//! ```bash
//! cargo run --example fetch_device -- --host 10.0.0.1 --user admin --password admin \
//!     --method rest --url https://10.0.0.1/api/v1/config
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use cfgrab::{ConfigService, DeviceModel, DeviceSpec, EngineConfig, Protocol};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.password.is_none() && args.key.is_none() {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }

    let spec = DeviceSpec {
        host: args.host,
        port: args.port,
        username: args.user,
        password: args.password,
        private_key: args.key.map(PathBuf::from),
        passphrase: None,
        device_model: Some(DeviceModel::from_tag(&args.model)),
        method: Some(args.method.to_string()),
        rest_url: args.url,
        rest_port: None,
    };

    let service = ConfigService::from_config(&EngineConfig::default().apply_env()?)?;
    let response = service
        .fetch_device(spec, Some(Duration::from_secs(args.timeout)))
        .await?;

    println!("{}", response.message);
    for outcome in &response.results {
        if let Some(config) = outcome.raw_config() {
            println!("{}", "-".repeat(60));
            println!("{config}");
        }
    }

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: Option<u16>,
    user: String,
    password: Option<String>,
    key: Option<String>,
    model: String,
    method: Protocol,
    url: Option<String>,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut port = None;
        let mut user = env::var("USER").unwrap_or_else(|_| "root".to_string());
        let mut password = None;
        let mut key = None;
        let mut model = "linux".to_string();
        let mut method = Protocol::Shell;
        let mut url = None;
        let mut timeout = 10u64;

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--host" | "-h" => host = value.unwrap_or(host),
                "--port" | "-p" => port = value.and_then(|v| v.parse().ok()),
                "--user" | "-u" => user = value.unwrap_or(user),
                "--password" | "-P" => password = value,
                "--key" | "-k" => key = value,
                "--model" | "-m" => model = value.unwrap_or(model),
                "--method" => {
                    method = value.and_then(|v| v.parse().ok()).unwrap_or(method);
                }
                "--url" => url = value,
                "--timeout" | "-t" => timeout = value.and_then(|v| v.parse().ok()).unwrap_or(10),
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        Self {
            host,
            port,
            user,
            password,
            key,
            model,
            method,
            url,
            timeout,
        }
    }

    fn print_help() {
        println!(
            r#"cfgrab fetch_device example

USAGE:
    cargo run --example fetch_device -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Target host [default: localhost]
    -p, --port <PORT>        SSH port, or the REST port for --method rest
    -u, --user <USER>        Username [default: $USER]
    -P, --password <PASS>    Password for authentication
    -k, --key <PATH>         Path to SSH private key
    -m, --model <MODEL>      Device model tag [default: linux]
    --method <METHOD>        ssh, rest or both [default: ssh]
    --url <URL>              REST endpoint override
    -t, --timeout <SECS>     Fetch timeout [default: 10]
    --help                   Print this help message
"#
        );
    }
}
