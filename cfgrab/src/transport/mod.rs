//! Protocol clients.
//!
//! A fetch is described by a [`ConfigRequest`], a closed variant over the
//! two supported transports. [`ShellClient`] runs commands over an SSH exec
//! channel (russh); [`RestClient`] issues HTTP requests (reqwest). Both are
//! stateless per call: every fetch opens its own connection and closes it
//! before returning.
//!
//! The orchestrator talks to the clients through the [`ConfigFetcher`]
//! trait so tests can substitute scripted devices.

pub mod config;
mod output;
mod rest;
mod ssh;

use std::future::Future;

pub use config::{HostKeyVerification, RestOptions, ShellOptions};
pub use output::{OutputBuffer, normalize_config};
pub use rest::{HEALTH_ENDPOINTS, RestClient};
pub use ssh::ShellClient;

use crate::device::{DeviceDescriptor, Source};
use crate::error::FetchError;
use crate::platform::RestDialect;

/// Shell retrieval: the command plus how to read its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRequest {
    pub command: String,

    /// Tried in order, in the same session, while output is empty.
    pub fallback_commands: Vec<String>,

    /// Output substrings that mean the command failed.
    pub failed_when_contains: Vec<String>,
}

impl ShellRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            fallback_commands: vec![],
            failed_when_contains: vec![],
        }
    }
}

/// Where a REST request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestTarget {
    /// Joined onto the device base URL.
    Path(String),

    /// Absolute URL, used as-is.
    Url(String),
}

/// REST retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestRequest {
    pub target: RestTarget,
    pub dialect: RestDialect,
}

impl RestRequest {
    /// A plain `GET` of `path` on the device.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            target: RestTarget::Path(path.into()),
            dialect: RestDialect::Plain,
        }
    }

    /// Request for a per-device endpoint override.
    ///
    /// An `http://` or `https://` override is an absolute URL; anything else
    /// is a path on the device. Overrides are always fetched with `GET`.
    pub fn override_endpoint(endpoint: &str) -> Self {
        let endpoint = endpoint.trim();
        let lower = endpoint.to_ascii_lowercase();
        let target = if lower.starts_with("http://") || lower.starts_with("https://") {
            RestTarget::Url(endpoint.to_string())
        } else if endpoint.starts_with('/') {
            RestTarget::Path(endpoint.to_string())
        } else {
            RestTarget::Path(format!("/{endpoint}"))
        };
        Self {
            target,
            dialect: RestDialect::Plain,
        }
    }
}

/// One configuration fetch, resolved from the model registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigRequest {
    Shell(ShellRequest),
    Rest(RestRequest),
}

impl ConfigRequest {
    /// The transport this request runs over.
    pub fn source(&self) -> Source {
        match self {
            Self::Shell(_) => Source::Shell,
            Self::Rest(_) => Source::Rest,
        }
    }
}

/// Fetches configuration from a single device.
///
/// Implementations hold no per-device state between calls. Callers bound
/// each call with their own deadline, so an implementation may wait on the
/// network indefinitely.
pub trait ConfigFetcher: Send + Sync + 'static {
    /// Fetch the running configuration described by `request`.
    fn fetch(
        &self,
        device: &DeviceDescriptor,
        request: &ConfigRequest,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;

    /// Check that `device` is reachable and accepts its credentials over
    /// `source`, without retrieving anything.
    fn probe(
        &self,
        device: &DeviceDescriptor,
        source: Source,
    ) -> impl Future<Output = Result<(), FetchError>> + Send;
}

/// The production fetcher: a shell client and a REST client.
#[derive(Debug, Clone)]
pub struct ProtocolClients {
    shell: ShellClient,
    rest: RestClient,
}

impl ProtocolClients {
    pub fn new(shell: ShellClient, rest: RestClient) -> Self {
        Self { shell, rest }
    }

    /// Build both clients from their options.
    pub fn from_options(shell: ShellOptions, rest: RestOptions) -> crate::Result<Self> {
        Ok(Self {
            shell: ShellClient::new(shell),
            rest: RestClient::new(rest)?,
        })
    }

    pub fn shell(&self) -> &ShellClient {
        &self.shell
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }
}

impl ConfigFetcher for ProtocolClients {
    async fn fetch(
        &self,
        device: &DeviceDescriptor,
        request: &ConfigRequest,
    ) -> Result<String, FetchError> {
        match request {
            ConfigRequest::Shell(shell) => self.shell.fetch(device, shell).await,
            ConfigRequest::Rest(rest) => self.rest.fetch(device, rest).await,
        }
    }

    async fn probe(&self, device: &DeviceDescriptor, source: Source) -> Result<(), FetchError> {
        match source {
            Source::Shell => self.shell.probe(device).await,
            Source::Rest => self.rest.probe(device).await.map(|_| ()),
        }
    }
}
