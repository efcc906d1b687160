//! Xpedite agent - probe activation and call-site instrumentation
//!
//! This library wires declarative probes to a native latency recorder. Each
//! probe names call sites; activation registers one transformer per call site
//! with the host loader, and every matching code unit is rewritten to call
//! `record(id)` on entry to the target method.

pub mod activation;
pub mod agent;
pub mod bridge;
pub mod config;
pub mod enrich;
pub mod error;
pub mod host;
pub mod logging;
pub mod probe;
pub mod rewrite;
pub mod transformer;
pub mod unit;

pub use activation::{ActivationReport, Activator, TransformerRegistration};
pub use agent::Agent;
pub use bridge::{BridgeContext, NativeBridge, Recorder};
pub use config::AgentConfig;
pub use error::{ActivationError, BridgeError, EnrichError, ProbeError, TransformError};
pub use probe::{CallSite, Probe, ProbeId, ProbeSet};
