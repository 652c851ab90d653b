//! REST transport using reqwest.

use std::error::Error as _;

use log::debug;
use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::config::RestOptions;
use super::output::{excerpt, normalize_config};
use super::{RestRequest, RestTarget};
use crate::device::DeviceDescriptor;
use crate::error::{FetchError, Result};
use crate::platform::RestDialect;

/// Endpoints tried in order when probing a device; the first one answering
/// with a status below 500 proves the API is up.
pub const HEALTH_ENDPOINTS: &[&str] = &["/api/health", "/api/status", "/health", "/status", "/"];

/// HTTP client for device REST APIs.
///
/// Idle connections are not kept, so every fetch stands alone.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    options: RestOptions,
}

impl RestClient {
    /// Build the client.
    pub fn new(options: RestOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(options.user_agent.as_str())
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self { http, options })
    }

    pub fn options(&self) -> &RestOptions {
        &self.options
    }

    /// Base URL of a device: scheme, host and optional port.
    pub fn base_url(&self, device: &DeviceDescriptor) -> std::result::Result<Url, FetchError> {
        let host = device.host();
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        let raw = match device.rest_port() {
            Some(port) => format!("{}://{host}:{port}", self.options.scheme()),
            None => format!("{}://{host}", self.options.scheme()),
        };
        Url::parse(&raw)
            .map_err(|e| FetchError::connection(device.host(), format!("invalid base URL '{raw}': {e}")))
    }

    fn url_for(
        &self,
        device: &DeviceDescriptor,
        target: &RestTarget,
    ) -> std::result::Result<Url, FetchError> {
        match target {
            RestTarget::Url(url) => Url::parse(url)
                .map_err(|e| FetchError::protocol(format!("invalid endpoint URL '{url}': {e}"))),
            RestTarget::Path(path) => self
                .base_url(device)?
                .join(path)
                .map_err(|e| FetchError::protocol(format!("invalid endpoint path '{path}': {e}"))),
        }
    }

    fn authorize(&self, builder: RequestBuilder, device: &DeviceDescriptor) -> RequestBuilder {
        let builder = builder.header(ACCEPT, "application/json");
        match device.auth().password() {
            Some(password) => builder.basic_auth(device.username(), Some(password.expose_secret())),
            None => builder,
        }
    }

    /// Fetch the configuration described by `request`.
    pub async fn fetch(
        &self,
        device: &DeviceDescriptor,
        request: &RestRequest,
    ) -> std::result::Result<String, FetchError> {
        let url = self.url_for(device, &request.target)?;
        let target = url.to_string();

        let builder = match &request.dialect {
            RestDialect::Plain => {
                debug!("GET {target}");
                self.http.get(url)
            }
            RestDialect::Eapi { commands } => {
                debug!("POST {target} (eAPI: {})", commands.join("; "));
                self.http.post(url).json(&eapi_request(commands))
            }
        };

        let response = self
            .authorize(builder, device)
            .send()
            .await
            .map_err(|e| transport_error(&target, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&target, e))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Auth {
                user: device.username().to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Protocol {
                status: Some(status.as_u16()),
                message: excerpt(&body),
            });
        }

        match &request.dialect {
            RestDialect::Plain => Ok(normalize_config(body)),
            RestDialect::Eapi { .. } => eapi_output(&body),
        }
    }

    /// Find the first health endpoint that answers, returning its path.
    pub async fn probe(&self, device: &DeviceDescriptor) -> std::result::Result<String, FetchError> {
        let base = self.base_url(device)?;
        let mut last_error = None;

        for endpoint in HEALTH_ENDPOINTS {
            let Ok(url) = base.join(endpoint) else {
                continue;
            };
            let target = url.to_string();
            match self.authorize(self.http.get(url), device).send().await {
                Ok(response) if response.status().as_u16() < 500 => {
                    debug!("{target} answered {}", response.status());
                    return Ok((*endpoint).to_string());
                }
                Ok(response) => {
                    last_error = Some(FetchError::Protocol {
                        status: Some(response.status().as_u16()),
                        message: format!("{endpoint} answered with a server error"),
                    });
                }
                Err(e) => last_error = Some(transport_error(&target, e)),
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::protocol("no reachable endpoints found")))
    }
}

fn transport_error(target: &str, err: reqwest::Error) -> FetchError {
    if err.is_decode() || err.is_body() {
        return FetchError::protocol(format!("failed to read response from {target}: {err}"));
    }
    // reqwest's own message names the URL; the cause says why it failed.
    let message = match err.source() {
        Some(source) => source.to_string(),
        None => err.to_string(),
    };
    FetchError::connection(target, message)
}

fn eapi_request(commands: &[String]) -> serde_json::Value {
    json!({
        "jsonrpc": "2.0",
        "method": "runCmds",
        "params": {
            "version": 1,
            "cmds": commands,
            "format": "text",
        },
        "id": "cfgrab",
    })
}

#[derive(Debug, Deserialize)]
struct EapiResponse {
    #[serde(default)]
    result: Vec<EapiResult>,
    error: Option<EapiError>,
}

#[derive(Debug, Deserialize)]
struct EapiResult {
    #[serde(default)]
    output: String,
}

#[derive(Debug, Deserialize)]
struct EapiError {
    code: i64,
    message: String,
}

fn eapi_output(body: &str) -> std::result::Result<String, FetchError> {
    let response: EapiResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::protocol(format!("malformed eAPI response: {e}")))?;

    if let Some(error) = response.error {
        return Err(FetchError::protocol(format!(
            "eAPI error {}: {}",
            error.code, error.message
        )));
    }
    if response.result.is_empty() {
        return Err(FetchError::protocol("eAPI response has no result"));
    }

    let output = response
        .result
        .into_iter()
        .map(|r| r.output)
        .collect::<Vec<_>>()
        .join("\n");
    Ok(output.trim().to_string())
}
