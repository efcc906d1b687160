//! The process-scoped instrumentation agent
//!
//! Build one `Agent` at startup and pass it by reference. It owns the native
//! bridge context and the activation state, so there is no hidden global.

use crate::activation::{ActivationReport, Activator};
use crate::bridge::{BridgeContext, DylibLoader, NativeBridge};
use crate::config::AgentConfig;
use crate::enrich::{AppInfoWriter, Enricher, PassThrough};
use crate::error::{ActivationError, BridgeError};
use crate::host::HookRegistry;
use crate::probe::ProbeSet;
use crate::rewrite::EntryRewriter;
use std::sync::Arc;

#[derive(Debug)]
pub struct Agent {
    bridge: BridgeContext,
    activator: Activator,
}

impl Agent {
    /// Agent loading the recorder with `dlopen` and rewriting at method entry
    pub fn new(config: &AgentConfig) -> Self {
        let enricher: Box<dyn Enricher> = match &config.appinfo_path {
            Some(path) => Box::new(AppInfoWriter::new(path.clone())),
            None => Box::new(PassThrough),
        };
        let bridge = BridgeContext::with_loader(
            config.library_path.clone(),
            config.module_name(),
            Box::new(DylibLoader),
        );
        Self::with_parts(bridge, Activator::new(enricher, Arc::new(EntryRewriter)))
    }

    pub fn with_parts(bridge: BridgeContext, activator: Activator) -> Self {
        Self { bridge, activator }
    }

    pub fn bridge_context(&self) -> &BridgeContext {
        &self.bridge
    }

    pub fn activator(&self) -> &Activator {
        &self.activator
    }

    /// The loaded bridge, loading it on first use
    pub fn bridge(&self) -> Result<&NativeBridge, BridgeError> {
        self.bridge.bridge()
    }

    /// Activate a batch of probes against a host loader
    pub fn activate(
        &self,
        probes: ProbeSet,
        registry: &mut dyn HookRegistry,
    ) -> Result<ActivationReport, ActivationError> {
        self.activator.activate(&self.bridge, probes, registry)
    }
}
