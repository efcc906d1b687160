// Integration test utilities
//
// An in-memory recorder that doubles as its own module loader, so tests can
// drive the full activation pipeline without a native shared library.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use xpedite_agent::bridge::ModuleLoader;
use xpedite_agent::{BridgeContext, BridgeError, ProbeId, ProbeSet, Recorder};

pub const MODULE: &str = "libxpedite-test.so";

/// Records ids and profiled batches, counts loads
#[derive(Clone, Default)]
pub struct Tape {
    pub records: Arc<Mutex<Vec<u32>>>,
    pub profiled: Arc<Mutex<Vec<Vec<u32>>>>,
    pub loads: Arc<AtomicUsize>,
}

impl Tape {
    pub fn records(&self) -> Vec<u32> {
        self.records.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl Recorder for Tape {
    fn record(&self, id: ProbeId) {
        self.records.lock().unwrap().push(id.as_u32());
    }

    fn profile(&self, probes: &ProbeSet) {
        let ids = probes.iter().map(|p| p.id.as_u32()).collect();
        self.profiled.lock().unwrap().push(ids);
    }
}

impl ModuleLoader for Tape {
    fn load(&self, _path: &Path) -> Result<Box<dyn Recorder>, BridgeError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }
}

/// Directory holding a placeholder recorder module
pub fn module_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(MODULE), b"").unwrap();
    dir
}

/// Bridge context that finds the placeholder module and loads `tape`
pub fn bridge_context(dir: &TempDir, tape: &Tape) -> BridgeContext {
    BridgeContext::with_loader(
        vec![dir.path().to_path_buf()],
        MODULE,
        Box::new(tape.clone()),
    )
}
