//! Call-site transformers
//!
//! One transformer is registered per (call site, probe id). The host invokes
//! every registered transformer for every unit it loads, so the non-matching
//! path is a pair of string comparisons and nothing else.

use crate::error::TransformError;
use crate::probe::{CallSite, ProbeId};
use crate::rewrite::Rewriter;
use crate::unit::CodeUnit;
use std::sync::Arc;

/// Result of offering a unit to a transformer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformed {
    Rewritten(CodeUnit),
    Unchanged,
}

/// Capability invoked by the host loader on every unit load
pub trait Transformer: Send + Sync {
    fn transform(&self, unit: &CodeUnit) -> Result<Transformed, TransformError>;

    fn call_site(&self) -> &CallSite;

    fn probe_id(&self) -> ProbeId;
}

/// Rewrites the unit holding one call site to record one probe id
#[derive(Clone)]
pub struct CallSiteTransformer {
    call_site: CallSite,
    id: ProbeId,
    rewriter: Arc<dyn Rewriter>,
}

impl CallSiteTransformer {
    pub fn new(call_site: CallSite, id: ProbeId, rewriter: Arc<dyn Rewriter>) -> Self {
        Self {
            call_site,
            id,
            rewriter,
        }
    }
}

impl Transformer for CallSiteTransformer {
    fn transform(&self, unit: &CodeUnit) -> Result<Transformed, TransformError> {
        if !self.call_site.matches(unit) {
            return Ok(Transformed::Unchanged);
        }
        self.rewriter
            .rewrite(unit, &self.call_site, self.id)
            .map(Transformed::Rewritten)
    }

    fn call_site(&self) -> &CallSite {
        &self.call_site
    }

    fn probe_id(&self) -> ProbeId {
        self.id
    }
}

impl std::fmt::Debug for CallSiteTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSiteTransformer")
            .field("call_site", &self.call_site)
            .field("id", &self.id)
            .finish()
    }
}
