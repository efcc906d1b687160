//! Application metadata enrichment
//!
//! Runs before any probe reaches the recorder. `AppInfoWriter` publishes the
//! process identity and the listing of every activated probe so offline
//! tooling can attribute recorded ids back to names and call sites.

use crate::error::EnrichError;
use crate::probe::{Probe, ProbeSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

pub trait Enricher: Send + Sync {
    fn enrich(&self, probes: ProbeSet) -> Result<ProbeSet, EnrichError>;
}

/// Returns probes untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl Enricher for PassThrough {
    fn enrich(&self, probes: ProbeSet) -> Result<ProbeSet, EnrichError> {
        Ok(probes)
    }
}

#[derive(Serialize, Deserialize)]
struct AppInfo {
    pid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    executable: Option<String>,
    #[serde(default)]
    probes: Vec<Probe>,
}

impl AppInfo {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            executable: std::env::current_exe()
                .ok()
                .map(|p| p.display().to_string()),
            probes: Vec::new(),
        }
    }
}

/// Appends every activated batch to an app info file
///
/// A file left behind by another process is replaced; one written earlier by
/// this process keeps its probes and gains the new batch.
#[derive(Debug, Clone)]
pub struct AppInfoWriter {
    path: PathBuf,
}

impl AppInfoWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn existing(&self) -> Result<Option<AppInfo>, EnrichError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(EnrichError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        toml::from_str(&text)
            .map(Some)
            .map_err(|e| EnrichError::Format(format!("{}: {}", self.path.display(), e)))
    }

    fn merge(&self, probes: &ProbeSet) -> Result<AppInfo, EnrichError> {
        let current = AppInfo::current();
        let mut info = match self.existing()? {
            Some(info) if info.pid == current.pid => info,
            _ => current,
        };
        info.probes.extend(probes.iter().cloned());
        Ok(info)
    }
}

impl Enricher for AppInfoWriter {
    fn enrich(&self, probes: ProbeSet) -> Result<ProbeSet, EnrichError> {
        let info = self.merge(&probes)?;
        let text = toml::to_string(&info).map_err(|e| EnrichError::Format(e.to_string()))?;
        fs::write(&self.path, text).map_err(|source| EnrichError::Io {
            path: self.path.clone(),
            source,
        })?;
        info!(
            path = %self.path.display(),
            added = probes.len(),
            total = info.probes.len(),
            "wrote app info"
        );
        Ok(probes)
    }
}
