//! Probe activation
//!
//! Activation runs once per probe batch:
//!
//! 1. reject ids that are already active
//! 2. enrich the probes with application metadata, then repeat the id check
//! 3. load the native bridge (first batch only) and profile the probes
//! 4. register one transformer per call site, in declared order
//!
//! Registrations are handed to the host and never retracted. A later batch
//! with disjoint ids only adds transformers.

use crate::bridge::BridgeContext;
use crate::enrich::Enricher;
use crate::error::ActivationError;
use crate::host::HookRegistry;
use crate::probe::{CallSite, ProbeId, ProbeSet};
use crate::rewrite::Rewriter;
use crate::transformer::CallSiteTransformer;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// A transformer handed to the host registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformerRegistration {
    pub call_site: CallSite,
    pub probe_id: ProbeId,
}

/// Outcome of one activation batch
#[derive(Debug, Clone)]
pub struct ActivationReport {
    /// Registrations in the order they were made
    pub registrations: Vec<TransformerRegistration>,
    /// Module the recorder was loaded from
    pub recorder_path: PathBuf,
}

/// Coordinates enrichment, profiling and transformer registration
pub struct Activator {
    enricher: Box<dyn Enricher>,
    rewriter: Arc<dyn Rewriter>,
    // id -> probe name, for every id activated so far
    active: Mutex<HashMap<ProbeId, String>>,
}

impl Activator {
    pub fn new(enricher: Box<dyn Enricher>, rewriter: Arc<dyn Rewriter>) -> Self {
        Self {
            enricher,
            rewriter,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_active(&self, id: ProbeId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn activate(
        &self,
        bridge: &BridgeContext,
        probes: ProbeSet,
        registry: &mut dyn HookRegistry,
    ) -> Result<ActivationReport, ActivationError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        reject_active(&active, &probes)?;
        let probes = self.enricher.enrich(probes)?;
        // Enrichment may add probes of its own
        reject_active(&active, &probes)?;

        let bridge = bridge.bridge()?;
        bridge.profile(&probes);

        let mut registrations = Vec::with_capacity(probes.call_site_count());
        for probe in &probes {
            active.insert(probe.id, probe.name.clone());
            for call_site in &probe.call_sites {
                let transformer =
                    CallSiteTransformer::new(call_site.clone(), probe.id, self.rewriter.clone());
                registry.add_transformer(Box::new(transformer), true);
                debug!(probe = %probe.name, id = %probe.id, call_site = %call_site, "registered transformer");
                registrations.push(TransformerRegistration {
                    call_site: call_site.clone(),
                    probe_id: probe.id,
                });
            }
        }

        info!(
            probes = probes.len(),
            call_sites = registrations.len(),
            recorder = %bridge.path().display(),
            "activated probes"
        );

        Ok(ActivationReport {
            registrations,
            recorder_path: bridge.path().to_path_buf(),
        })
    }
}

fn reject_active(
    active: &HashMap<ProbeId, String>,
    probes: &ProbeSet,
) -> Result<(), ActivationError> {
    match probes.iter().find(|p| active.contains_key(&p.id)) {
        Some(probe) => Err(ActivationError::DuplicateProbeId {
            id: probe.id,
            name: probe.name.clone(),
        }),
        None => Ok(()),
    }
}

impl std::fmt::Debug for Activator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activator")
            .field("active", &self.active_count())
            .finish()
    }
}
