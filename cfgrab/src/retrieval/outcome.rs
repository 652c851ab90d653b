//! Per-device results and their aggregate.

use std::time::Duration;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::device::Source;
use crate::error::{ErrorKind, FetchError};

/// Result of one fetch attempt against one device over one transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOutcome {
    pub host: String,
    pub source: Source,
    /// The raw configuration, or why it could not be fetched.
    pub result: Result<String, FetchError>,
    pub elapsed: Duration,
}

impl RetrievalOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn raw_config(&self) -> Option<&str> {
        self.result.as_deref().ok()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.result.as_ref().err()
    }
}

/// Wire form of a [`FetchError`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&FetchError> for ErrorDetail {
    fn from(err: &FetchError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            status: err.status(),
        }
    }
}

impl Serialize for RetrievalOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RetrievalOutcome", 4)?;
        state.serialize_field("host", &self.host)?;
        state.serialize_field("source_protocol", &self.source)?;
        state.serialize_field("raw_config", &self.raw_config())?;
        state.serialize_field("error", &self.error().map(ErrorDetail::from))?;
        state.end()
    }
}

/// Outcomes of one batch, in request order.
///
/// Holds exactly one outcome per requested device and transport; a device
/// fetched over both transports contributes two adjacent outcomes, shell
/// first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedResult {
    outcomes: Vec<RetrievalOutcome>,
}

impl AggregatedResult {
    pub fn new(outcomes: Vec<RetrievalOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[RetrievalOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<RetrievalOutcome> {
        self.outcomes
    }

    pub fn iter(&self) -> impl Iterator<Item = &RetrievalOutcome> {
        self.outcomes.iter()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// "retrieved N of M".
    pub fn summary(&self) -> String {
        format!("retrieved {} of {}", self.succeeded(), self.len())
    }
}

impl IntoIterator for AggregatedResult {
    type Item = RetrievalOutcome;
    type IntoIter = std::vec::IntoIter<RetrievalOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

impl<'a> IntoIterator for &'a AggregatedResult {
    type Item = &'a RetrievalOutcome;
    type IntoIter = std::slice::Iter<'a, RetrievalOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.iter()
    }
}

impl Serialize for AggregatedResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AggregatedResult", 3)?;
        state.serialize_field("outcomes", &self.outcomes)?;
        state.serialize_field("succeeded", &self.succeeded())?;
        state.serialize_field("failed", &self.failed())?;
        state.end()
    }
}

/// Result of probing one device over one transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectivityReport {
    pub host: String,
    pub source: Source,
    pub result: Result<(), FetchError>,
    pub elapsed: Duration,
}

impl ConnectivityReport {
    pub fn is_reachable(&self) -> bool {
        self.result.is_ok()
    }
}

impl Serialize for ConnectivityReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ConnectivityReport", 4)?;
        state.serialize_field("host", &self.host)?;
        state.serialize_field("source_protocol", &self.source)?;
        state.serialize_field("reachable", &self.is_reachable())?;
        state.serialize_field("error", &self.result.as_ref().err().map(ErrorDetail::from))?;
        state.end()
    }
}
