//! Fetch running configurations for every device in a JSON inventory file
//!
//! Loads devices into an inventory, retrieves their configurations
//! concurrently and optionally saves each one to disk.
//!
//! # Inventory file
//!
//! A JSON array of devices:
//!
//! ```json
//! [
//!   {"host": "10.0.0.1", "username": "admin", "password": "admin", "device_model": "sonic"},
//!   {"host": "10.0.0.2", "username": "admin", "private_key": "/home/admin/.ssh/id_ed25519",
//!    "device_model": "cisco", "method": "both", "rest_port": 443}
//! ]
//! ```
//!
//! # Usage
//!
//! Print a summary:
//! ```bash
//! cargo run --example fetch_inventory -- --devices lab.json
//! ```
//!
//! Save configurations with a TOML engine config:
//! ```bash
//! cargo run --example fetch_inventory -- --devices lab.json --config cfgrab.toml --output backups --timestamp
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use cfgrab::persist::{SaveOptions, save_outcomes};
use cfgrab::retrieval::AggregatedResult;
use cfgrab::{ConfigService, EngineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let Some(devices) = &args.devices else {
        eprintln!("Error: --devices <FILE> is required");
        std::process::exit(1);
    };

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    }
    .apply_env()?;
    if let Some(limit) = args.concurrency {
        config = config.with_concurrency_limit(limit);
    }
    config.validate()?;

    let service = ConfigService::from_config(&config)?;

    let body = std::fs::read_to_string(devices)?;
    let added = service.add_devices_json(Some(&args.inventory), &body)?;
    println!("{}", added.message);
    for host in &added.skipped_hosts {
        println!("  skipped duplicate {host}");
    }

    if args.check {
        println!("\nChecking connectivity...");
        for report in service.check_connectivity(Some(&args.inventory), None).await {
            match &report.result {
                Ok(()) => println!("  {:<20} {:<5} reachable", report.host, report.source),
                Err(e) => println!("  {:<20} {:<5} {e}", report.host, report.source),
            }
        }
        return Ok(());
    }

    println!(
        "\nRetrieving configurations (concurrency {}, timeout {:?})...",
        config.concurrency_limit,
        args.timeout.unwrap_or(config.fetch_timeout)
    );
    println!("{}", "-".repeat(60));

    let response = service
        .retrieve(Some(&args.inventory), None, args.timeout)
        .await;
    for line in &response.messages {
        println!("{line}");
    }

    println!("{}", "-".repeat(60));
    println!("{}", response.message);

    if let Some(dir) = &args.output {
        let result = AggregatedResult::new(response.results);
        let options = SaveOptions {
            timestamp: args.timestamp,
        };
        for report in save_outcomes(&result, dir, &options).await? {
            println!("{}", report.message);
        }
    }

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    devices: Option<PathBuf>,
    config: Option<PathBuf>,
    inventory: String,
    output: Option<PathBuf>,
    timestamp: bool,
    concurrency: Option<usize>,
    timeout: Option<Duration>,
    check: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut devices = None;
        let mut config = None;
        let mut inventory = "default".to_string();
        let mut output = None;
        let mut timestamp = false;
        let mut concurrency = None;
        let mut timeout = None;
        let mut check = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--devices" | "-d" => {
                    i += 1;
                    if i < args.len() {
                        devices = Some(PathBuf::from(&args[i]));
                    }
                }
                "--config" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        config = Some(PathBuf::from(&args[i]));
                    }
                }
                "--inventory" | "-i" => {
                    i += 1;
                    if i < args.len() {
                        inventory = args[i].clone();
                    }
                }
                "--output" | "-o" => {
                    i += 1;
                    if i < args.len() {
                        output = Some(PathBuf::from(&args[i]));
                    }
                }
                "--concurrency" | "-n" => {
                    i += 1;
                    if i < args.len() {
                        concurrency = args[i].parse().ok();
                    }
                }
                "--timeout" | "-t" => {
                    i += 1;
                    if i < args.len() {
                        timeout = args[i]
                            .parse::<f64>()
                            .ok()
                            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
                    }
                }
                "--timestamp" => timestamp = true,
                "--check" => check = true,
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                }
            }
            i += 1;
        }

        Self {
            devices,
            config,
            inventory,
            output,
            timestamp,
            concurrency,
            timeout,
            check,
        }
    }

    fn print_help() {
        println!(
            r#"cfgrab fetch_inventory example

USAGE:
    cargo run --example fetch_inventory -- [OPTIONS]

OPTIONS:
    -d, --devices <FILE>     JSON file with the devices to load (required)
    -c, --config <FILE>      TOML engine configuration
    -i, --inventory <NAME>   Inventory name [default: default]
    -o, --output <DIR>       Save each configuration under DIR
    -n, --concurrency <N>    Maximum devices fetched at once
    -t, --timeout <SECS>     Per-fetch timeout
    --timestamp              Add a timestamp to saved file names
    --check                  Only probe connectivity
    --help                   Print this help message

ENVIRONMENT:
    CFGRAB_CONCURRENCY_LIMIT, CFGRAB_FETCH_TIMEOUT_SECS,
    CFGRAB_REST_USE_HTTPS, CFGRAB_REST_VERIFY_TLS
"#
        );
    }
}
