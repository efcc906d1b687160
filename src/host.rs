//! Host loader integration
//!
//! [`HookRegistry`] is the seam to whatever runtime loads code units. Activation
//! only needs to hand it transformers. [`LoaderHost`] is an in-process
//! registry and loader: it runs every registered transformer over each unit
//! it loads, in registration order, each one seeing the previous output.

use crate::error::TransformError;
use crate::transformer::{Transformed, Transformer};
use crate::unit::CodeUnit;
use tracing::{debug, error};

/// Accepts transformers from activation; ownership moves to the host
pub trait HookRegistry {
    /// Register a transformer
    ///
    /// With `can_retransform`, the host also applies it to units it already
    /// loaded, if it is able to redefine them.
    fn add_transformer(&mut self, transformer: Box<dyn Transformer>, can_retransform: bool);
}

/// A unit whose load or retransformation was aborted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub owner: String,
    pub error: TransformError,
}

struct Registration {
    transformer: Box<dyn Transformer>,
    can_retransform: bool,
}

/// In-process loader that dispatches registered transformers
#[derive(Default)]
pub struct LoaderHost {
    retransform_supported: bool,
    registrations: Vec<Registration>,
    loaded: Vec<CodeUnit>,
    diagnostics: Vec<LoadFailure>,
    rewrites: usize,
}

impl LoaderHost {
    /// Host that only instruments future loads
    pub fn new() -> Self {
        Self::default()
    }

    /// Host that can redefine already-loaded units
    pub fn with_retransform() -> Self {
        Self {
            retransform_supported: true,
            ..Self::default()
        }
    }

    /// Load a unit, running every registered transformer over it
    ///
    /// A transformer error aborts this unit's load only; it is logged and kept
    /// in [`diagnostics`](Self::diagnostics).
    pub fn load(&mut self, unit: CodeUnit) -> Result<&CodeUnit, TransformError> {
        let owner = unit.owner.clone();
        let mut current = unit;
        for registration in &self.registrations {
            match registration.transformer.transform(&current) {
                Ok(Transformed::Unchanged) => {}
                Ok(Transformed::Rewritten(rewritten)) => {
                    debug!(
                        call_site = %registration.transformer.call_site(),
                        id = %registration.transformer.probe_id(),
                        "instrumented call site"
                    );
                    self.rewrites += 1;
                    current = rewritten;
                }
                Err(e) => {
                    error!(owner = %owner, error = %e, "aborting load of code unit");
                    self.diagnostics.push(LoadFailure {
                        owner,
                        error: e.clone(),
                    });
                    return Err(e);
                }
            }
        }

        let slot = match self.loaded.iter().position(|u| u.owner == owner) {
            Some(i) => {
                self.loaded[i] = current;
                i
            }
            None => {
                self.loaded.push(current);
                self.loaded.len() - 1
            }
        };
        Ok(&self.loaded[slot])
    }

    /// Currently loaded definition of a unit
    pub fn unit(&self, owner: &str) -> Option<&CodeUnit> {
        self.loaded.iter().find(|u| u.owner == owner)
    }

    pub fn transformer_count(&self) -> usize {
        self.registrations.len()
    }

    pub fn retransformable_count(&self) -> usize {
        self.registrations.iter().filter(|r| r.can_retransform).count()
    }

    /// Number of successful rewrites across all loads
    pub fn rewrite_count(&self) -> usize {
        self.rewrites
    }

    pub fn diagnostics(&self) -> &[LoadFailure] {
        &self.diagnostics
    }

    fn retransform_loaded(&mut self, transformer: &dyn Transformer) {
        for unit in &mut self.loaded {
            match transformer.transform(unit) {
                Ok(Transformed::Unchanged) => {}
                Ok(Transformed::Rewritten(rewritten)) => {
                    debug!(
                        call_site = %transformer.call_site(),
                        id = %transformer.probe_id(),
                        "retransformed loaded unit"
                    );
                    self.rewrites += 1;
                    *unit = rewritten;
                }
                Err(e) => {
                    error!(owner = %unit.owner, error = %e, "retransformation failed, keeping original");
                    self.diagnostics.push(LoadFailure {
                        owner: unit.owner.clone(),
                        error: e,
                    });
                }
            }
        }
    }
}

impl HookRegistry for LoaderHost {
    fn add_transformer(&mut self, transformer: Box<dyn Transformer>, can_retransform: bool) {
        if can_retransform && self.retransform_supported {
            self.retransform_loaded(transformer.as_ref());
        }
        self.registrations.push(Registration {
            transformer,
            can_retransform,
        });
    }
}

impl std::fmt::Debug for LoaderHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderHost")
            .field("retransform_supported", &self.retransform_supported)
            .field("transformers", &self.registrations.len())
            .field("loaded", &self.loaded.len())
            .field("rewrites", &self.rewrites)
            .finish()
    }
}
