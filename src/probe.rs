//! Probes and the call sites they instrument
//!
//! A probe is one logical measurement point. It carries the integer id handed
//! to the native recorder and the list of call sites whose entry records it.

use crate::error::ProbeError;
use crate::unit::CodeUnit;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Id handed to the native recorder on every record
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ProbeId(u32);

impl ProbeId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for ProbeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A method of an owning type targeted for instrumentation
#[derive(Debug, Clone, Hash, PartialEq, Eq, Deserialize, Serialize)]
pub struct CallSite {
    /// Fully qualified name of the owning type
    pub owner: String,
    /// Method name with parameter list, e.g. `send(Order)`
    pub signature: String,
}

impl CallSite {
    pub fn new(owner: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            signature: signature.into(),
        }
    }

    /// Check whether a loaded unit contains this call site
    ///
    /// Runs for every unit the host loads, so it only compares strings.
    pub fn matches(&self, unit: &CodeUnit) -> bool {
        unit.owner == self.owner && unit.method(&self.signature).is_some()
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.signature)
    }
}

/// A named measurement point made of one or more call sites
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Probe {
    pub name: String,
    pub id: ProbeId,
    pub call_sites: Vec<CallSite>,
}

impl Probe {
    pub fn new(name: impl Into<String>, id: u32) -> Self {
        Self {
            name: name.into(),
            id: ProbeId(id),
            call_sites: Vec::new(),
        }
    }

    /// Add a call site (builder style)
    pub fn with_call_site(mut self, owner: impl Into<String>, signature: impl Into<String>) -> Self {
        self.call_sites.push(CallSite::new(owner, signature));
        self
    }
}

/// Probes keyed by id, in insertion order
#[derive(Debug, Clone, Default)]
pub struct ProbeSet {
    probes: Vec<Probe>,
    index: HashMap<ProbeId, usize>,
}

impl ProbeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from probes, rejecting duplicate ids, empty probes and
    /// repeated call sites
    pub fn from_probes(probes: impl IntoIterator<Item = Probe>) -> Result<Self, ProbeError> {
        let mut set = Self::new();
        for probe in probes {
            set.insert(probe)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, probe: Probe) -> Result<(), ProbeError> {
        if probe.call_sites.is_empty() {
            return Err(ProbeError::EmptyProbe(probe.name));
        }
        let mut seen = HashSet::with_capacity(probe.call_sites.len());
        for call_site in &probe.call_sites {
            if !seen.insert(call_site) {
                return Err(ProbeError::DuplicateCallSite {
                    probe: probe.name.clone(),
                    call_site: call_site.clone(),
                });
            }
        }
        if let Some(&existing) = self.index.get(&probe.id) {
            return Err(ProbeError::DuplicateProbeId {
                id: probe.id,
                existing: self.probes[existing].name.clone(),
                duplicate: probe.name,
            });
        }
        self.index.insert(probe.id, self.probes.len());
        self.probes.push(probe);
        Ok(())
    }

    pub fn get(&self, id: ProbeId) -> Option<&Probe> {
        self.index.get(&id).map(|&i| &self.probes[i])
    }

    pub fn contains(&self, id: ProbeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Probe> {
        self.probes.iter()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Total number of call sites across all probes
    pub fn call_site_count(&self) -> usize {
        self.probes.iter().map(|p| p.call_sites.len()).sum()
    }
}

impl<'a> IntoIterator for &'a ProbeSet {
    type Item = &'a Probe;
    type IntoIter = std::slice::Iter<'a, Probe>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
