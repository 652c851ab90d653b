//! Retrieval orchestrator.
//!
//! [`Orchestrator::retrieve`] fetches a batch of devices with at most
//! `concurrency_limit` devices in flight. Each fetch runs as its own tokio
//! task under its own deadline, so a device that hangs, fails or panics
//! only affects its own outcome. Outcomes are returned in input order.

mod outcome;

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};
use tokio::task::{JoinError, JoinHandle};

pub use outcome::{AggregatedResult, ConnectivityReport, ErrorDetail, RetrievalOutcome};

use crate::config::EngineConfig;
use crate::device::{DeviceDescriptor, Source};
use crate::error::FetchError;
use crate::platform::ModelRegistry;
use crate::transport::{ConfigFetcher, ProtocolClients};

/// Fans fetches out over a [`ConfigFetcher`].
pub struct Orchestrator<F = ProtocolClients> {
    fetcher: Arc<F>,
    registry: Arc<ModelRegistry>,
    concurrency_limit: usize,
    fetch_timeout: Duration,
}

impl<F> Clone for Orchestrator<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            registry: Arc::clone(&self.registry),
            concurrency_limit: self.concurrency_limit,
            fetch_timeout: self.fetch_timeout,
        }
    }
}

impl Orchestrator<ProtocolClients> {
    /// Build the production orchestrator from engine settings.
    pub fn from_engine_config(config: &EngineConfig) -> crate::Result<Self> {
        let clients = ProtocolClients::from_options(config.shell.clone(), config.rest.clone())?;
        Ok(Self::from_config(clients, config))
    }
}

impl<F: ConfigFetcher> Orchestrator<F> {
    /// Create an orchestrator over the global model registry with default
    /// limits.
    pub fn new(fetcher: F) -> Self {
        let defaults = EngineConfig::default();
        Self {
            fetcher: Arc::new(fetcher),
            registry: ModelRegistry::global(),
            concurrency_limit: defaults.concurrency_limit,
            fetch_timeout: defaults.fetch_timeout,
        }
    }

    /// Create an orchestrator taking its limits from `config`.
    pub fn from_config(fetcher: F, config: &EngineConfig) -> Self {
        Self::new(fetcher)
            .with_concurrency_limit(config.concurrency_limit)
            .with_fetch_timeout(config.fetch_timeout)
    }

    /// Use a different model registry.
    pub fn with_registry(mut self, registry: Arc<ModelRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Set the number of devices fetched at once (at least 1).
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    /// Set the default per-fetch deadline.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch every device's configuration with the default deadline.
    pub async fn retrieve(&self, devices: &[Arc<DeviceDescriptor>]) -> AggregatedResult {
        self.retrieve_with_timeout(devices, self.fetch_timeout).await
    }

    /// Fetch every device's configuration, each fetch bounded by `timeout`.
    pub async fn retrieve_with_timeout(
        &self,
        devices: &[Arc<DeviceDescriptor>],
        timeout: Duration,
    ) -> AggregatedResult {
        let outcomes = self
            .fan_out(devices, |device| async move {
                let fetches = device
                    .protocol()
                    .sources()
                    .iter()
                    .map(|&source| self.fetch_one(Arc::clone(&device), source, timeout));
                join_all(fetches).await
            })
            .await;

        let result = AggregatedResult::new(outcomes);
        info!(
            "Configuration retrieval finished: {} ({} device(s))",
            result.summary(),
            devices.len()
        );
        result
    }

    /// Probe every device over its configured transports.
    pub async fn check_connectivity(
        &self,
        devices: &[Arc<DeviceDescriptor>],
    ) -> Vec<ConnectivityReport> {
        let timeout = self.fetch_timeout;
        let reports = self
            .fan_out(devices, |device| async move {
                let probes = device
                    .protocol()
                    .sources()
                    .iter()
                    .map(|&source| self.probe_one(Arc::clone(&device), source, timeout));
                join_all(probes).await
            })
            .await;

        let reachable = reports.iter().filter(|r| r.is_reachable()).count();
        info!("Connectivity check: {reachable} of {} reachable", reports.len());
        reports
    }

    /// Run `per_device` over `devices`, at most `concurrency_limit` at a
    /// time, and concatenate the results in input order.
    async fn fan_out<'a, T, Fut>(
        &'a self,
        devices: &'a [Arc<DeviceDescriptor>],
        per_device: impl Fn(Arc<DeviceDescriptor>) -> Fut,
    ) -> Vec<T>
    where
        Fut: Future<Output = Vec<T>> + 'a,
    {
        let mut slots: Vec<Option<Vec<T>>> = devices.iter().map(|_| None).collect();

        let mut completions = stream::iter(devices.iter().cloned().enumerate())
            .map(|(index, device)| {
                let unit = per_device(device);
                async move { (index, unit.await) }
            })
            .buffer_unordered(self.concurrency_limit);

        while let Some((index, results)) = completions.next().await {
            slots[index] = Some(results);
        }

        slots.into_iter().flatten().flatten().collect()
    }

    async fn fetch_one(
        &self,
        device: Arc<DeviceDescriptor>,
        source: Source,
        timeout: Duration,
    ) -> RetrievalOutcome {
        let started = Instant::now();

        let result = match self.registry.resolve(&device, source) {
            Ok(request) => {
                debug!("Fetching configuration from {} via {source}", device.host());
                let fetcher = Arc::clone(&self.fetcher);
                let target = Arc::clone(&device);
                let task = tokio::spawn(async move { fetcher.fetch(&target, &request).await });
                bounded(task, timeout).await
            }
            Err(e) => Err(FetchError::from(e)),
        };

        if let Err(e) = &result {
            warn!("Failed to fetch config for {} via {source}: {e}", device.host());
        }

        RetrievalOutcome {
            host: device.host().to_string(),
            source,
            result,
            elapsed: started.elapsed(),
        }
    }

    async fn probe_one(
        &self,
        device: Arc<DeviceDescriptor>,
        source: Source,
        timeout: Duration,
    ) -> ConnectivityReport {
        let started = Instant::now();

        debug!("Probing {} via {source}", device.host());
        let fetcher = Arc::clone(&self.fetcher);
        let target = Arc::clone(&device);
        let task = tokio::spawn(async move { fetcher.probe(&target, source).await });
        let result = bounded(task, timeout).await;

        if let Err(e) = &result {
            warn!("{} unreachable via {source}: {e}", device.host());
        }

        ConnectivityReport {
            host: device.host().to_string(),
            source,
            result,
            elapsed: started.elapsed(),
        }
    }
}

/// Await a fetch task for at most `timeout`, aborting it on expiry.
async fn bounded<T>(
    mut task: JoinHandle<Result<T, FetchError>>,
    timeout: Duration,
) -> Result<T, FetchError> {
    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(FetchError::Internal {
            message: join_error_message(e),
        }),
        Err(_) => {
            task.abort();
            Err(FetchError::Timeout(timeout))
        }
    }
}

fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return "fetch task was cancelled".to_string();
    }
    let payload: Box<dyn Any + Send> = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("fetch task panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("fetch task panicked: {message}")
    } else {
        "fetch task panicked".to_string()
    }
}
