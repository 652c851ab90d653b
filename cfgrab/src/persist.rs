//! Writing retrieved configurations to disk.
//!
//! One file per successful outcome, named after the host. A failed outcome
//! or a failed write is reported on its own entry and never stops the rest
//! of the batch.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{info, warn};
use serde::Serialize;

use crate::device::Source;
use crate::error::Result;
use crate::retrieval::{AggregatedResult, RetrievalOutcome};

/// File naming options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Insert a local timestamp (`YYYYmmddTHHMMSS`) into each file name.
    pub timestamp: bool,
}

/// What happened to one outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub host: String,
    pub source: Source,
    pub file_path: Option<PathBuf>,
    pub message: String,
    pub error: Option<String>,
}

impl SaveReport {
    pub fn is_saved(&self) -> bool {
        self.file_path.is_some()
    }
}

/// Save every successful outcome under `dir`, creating it if needed.
///
/// Only a failure to create `dir` is returned as an error.
pub async fn save_outcomes(
    result: &AggregatedResult,
    dir: impl AsRef<Path>,
    options: &SaveOptions,
) -> Result<Vec<SaveReport>> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;

    let stamp = options
        .timestamp
        .then(|| Local::now().format("%Y%m%dT%H%M%S").to_string());

    let mut per_host: HashMap<&str, usize> = HashMap::new();
    for outcome in result {
        *per_host.entry(outcome.host.as_str()).or_insert(0) += 1;
    }

    let mut taken = HashSet::new();
    let mut reports = Vec::with_capacity(result.len());
    for outcome in result {
        let split_by_source = per_host.get(outcome.host.as_str()).copied().unwrap_or(0) > 1;
        let mut name = file_name(outcome, split_by_source, stamp.as_deref());
        if outcome.is_success() {
            name = claim(&mut taken, name);
        }
        reports.push(save_one(outcome, dir.join(name)).await);
    }

    let saved = reports.iter().filter(|r| r.is_saved()).count();
    info!(
        "Saved {saved}/{} configuration(s) to {}",
        reports.len(),
        dir.display()
    );
    Ok(reports)
}

async fn save_one(outcome: &RetrievalOutcome, path: PathBuf) -> SaveReport {
    let host = outcome.host.clone();

    let config = match &outcome.result {
        Ok(config) => config,
        Err(e) => {
            return SaveReport {
                message: format!("No configuration retrieved for host {host}"),
                host,
                source: outcome.source,
                file_path: None,
                error: Some(e.to_string()),
            };
        }
    };

    match tokio::fs::write(&path, config).await {
        Ok(()) => SaveReport {
            message: format!("Configuration for host {host} saved to {}", path.display()),
            host,
            source: outcome.source,
            file_path: Some(path),
            error: None,
        },
        Err(e) => {
            warn!("Failed to write {}: {e}", path.display());
            SaveReport {
                message: format!("Failed to save configuration for host {host}"),
                host,
                source: outcome.source,
                file_path: None,
                error: Some(format!("Failed to save config to file: {e}")),
            }
        }
    }
}

const FILE_SUFFIX: &str = "_config.txt";

/// `<host>[_<source>][_<stamp>]_config.txt`
fn file_name(outcome: &RetrievalOutcome, with_source: bool, stamp: Option<&str>) -> String {
    let mut name = sanitize(&outcome.host);
    if with_source {
        name.push('_');
        name.push_str(outcome.source.as_str());
    }
    if let Some(stamp) = stamp {
        name.push('_');
        name.push_str(stamp);
    }
    name.push_str(FILE_SUFFIX);
    name
}

/// Reserve `name` for this batch, numbering it if another host already
/// sanitised to the same name.
fn claim(taken: &mut HashSet<String>, name: String) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let stem = name.strip_suffix(FILE_SUFFIX).unwrap_or(&name);
    let mut n = 2;
    loop {
        let candidate = format!("{stem}_{n}{FILE_SUFFIX}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn sanitize(host: &str) -> String {
    host.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
