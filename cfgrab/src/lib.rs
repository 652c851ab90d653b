//! # cfgrab
//!
//! Concurrent running-configuration retrieval for network device inventories.
//!
//! cfgrab keeps named inventories of devices and fetches their running
//! configuration over SSH (russh) or REST (reqwest), many devices at once,
//! with a per-device deadline. One device failing never fails the batch:
//! every requested device gets an outcome, in request order.
//!
//! ## Features
//!
//! - Bounded concurrent fan-out with per-fetch timeouts
//! - Built-in commands and REST endpoints for 27 device models
//! - SSH password and key authentication with known_hosts checking
//! - Arista eAPI and plain REST endpoints, with per-device overrides
//! - Optional saving of configurations to disk
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cfgrab::{ConfigService, EngineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cfgrab::Error> {
//!     let config = EngineConfig::default().apply_env()?;
//!     let service = ConfigService::from_config(&config)?;
//!
//!     service.add_devices_json(
//!         Some("lab"),
//!         r#"[{"host": "10.0.0.1", "username": "admin", "password": "secret",
//!              "device_model": "sonic"}]"#,
//!     )?;
//!
//!     let response = service.retrieve(Some("lab"), None, None).await;
//!     for outcome in &response.results {
//!         match &outcome.result {
//!             Ok(config) => println!("{}: {} bytes", outcome.host, config.len()),
//!             Err(e) => println!("{}: {e}", outcome.host),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod device;
pub mod error;
pub mod inventory;
pub mod persist;
pub mod platform;
pub mod retrieval;
pub mod service;
pub mod transport;

// Re-export main types for convenience
pub use api::{ConfigResponse, HostFilter, InventoryResponse};
pub use config::EngineConfig;
pub use device::{DeviceDescriptor, DeviceModel, DeviceSpec, Protocol, Source};
pub use error::{Error, ErrorKind, FetchError, Result};
pub use inventory::InventoryStore;
pub use platform::ModelRegistry;
pub use retrieval::{AggregatedResult, Orchestrator, RetrievalOutcome};
pub use service::ConfigService;
pub use transport::{ConfigFetcher, ProtocolClients};
