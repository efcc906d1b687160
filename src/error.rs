//! Error types for probe activation and call-site instrumentation
//!
//! Propagation policy:
//! - [`BridgeError`] is fatal for instrumentation; callers abort startup.
//! - [`EnrichError`] and probe validation errors surface synchronously from
//!   activation, before anything is registered.
//! - [`TransformError`] aborts the load of one code unit only.

use crate::probe::{CallSite, ProbeId};
use std::path::PathBuf;
use thiserror::Error;

/// Failure to bring the native recorder into the process
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("failed to locate native recorder '{module}' in library path {searched:?}")]
    NotFound {
        module: String,
        searched: Vec<PathBuf>,
    },

    #[error("failed to load native recorder {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("native recorder {path} does not export symbol '{symbol}'")]
    MissingSymbol { path: PathBuf, symbol: String },
}

/// Failure of the metadata enricher
#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("failed to access app info at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to format app info: {0}")]
    Format(String),
}

/// Invalid probe definitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("duplicate probe id {id} ('{existing}' and '{duplicate}')")]
    DuplicateProbeId {
        id: ProbeId,
        existing: String,
        duplicate: String,
    },

    #[error("probe '{0}' has no call sites")]
    EmptyProbe(String),

    #[error("probe '{probe}' lists call site {call_site} more than once")]
    DuplicateCallSite { probe: String, call_site: CallSite },
}

/// Failure to rewrite a matched code unit
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("call site {0} not found")]
    MethodNotFound(CallSite),

    #[error("malformed body for {call_site}: {reason}")]
    Malformed { call_site: CallSite, reason: String },
}

/// Failure of a probe activation batch
#[derive(Error, Debug)]
pub enum ActivationError {
    #[error("metadata enrichment failed: {0}")]
    Metadata(#[from] EnrichError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("probe id {id} ('{name}') is already active")]
    DuplicateProbeId { id: ProbeId, name: String },
}
