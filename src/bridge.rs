//! Bridge to the native latency recorder
//!
//! The recorder is a shared library exporting two C-ABI entry points:
//!
//! ```text
//! void xpedite_record(uint32_t id);
//! void xpedite_profile(const NativeProbe* probes, size_t len);
//! ```
//!
//! `record` is called from every instrumented call site, on any thread, at
//! arbitrary rates. It is a direct call through a resolved function pointer:
//! no locks, no allocation, only the `u32` id crosses the boundary.
//! `profile` is called once per activation so the recorder can reserve
//! storage for every id before the first sample.
//!
//! # Loading
//!
//! [`BridgeContext`] owns the UNLOADED → LOADED transition. The first caller of
//! [`BridgeContext::bridge`] searches the configured directories in order and
//! loads the first `<dir>/<module>` that exists. Concurrent first callers
//! serialize on a mutex and re-check, so exactly one load happens. A failed
//! search leaves the context UNLOADED.

use crate::error::BridgeError;
use crate::probe::{ProbeId, ProbeSet};
use libloading::Library;
use std::ffi::{c_char, CString};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::{debug, info};

const RECORD_SYMBOL: &[u8] = b"xpedite_record\0";
const PROFILE_SYMBOL: &[u8] = b"xpedite_profile\0";

type RecordFn = unsafe extern "C" fn(u32);
type ProfileFn = unsafe extern "C" fn(*const NativeProbe, usize);

/// Platform file name of the native recorder (`libxpedite.so` on Linux)
///
/// The recorder exports plain C symbols rather than JNI entry points, so it
/// is named after the library itself and not `libXpediteJNI.so`.
pub fn default_module_name() -> String {
    libloading::library_filename("xpedite")
        .to_string_lossy()
        .into_owned()
}

/// The recording facility behind the bridge
pub trait Recorder: Send + Sync {
    /// Record a sample for a probe id
    fn record(&self, id: ProbeId);

    /// Announce every probe before the first record
    fn profile(&self, probes: &ProbeSet);
}

/// Probe entry passed to `xpedite_profile`
#[repr(C)]
#[derive(Debug)]
pub struct NativeProbe {
    pub id: u32,
    pub name: *const c_char,
}

/// Recorder backed by a dynamically loaded shared library
pub struct NativeRecorder {
    record: RecordFn,
    profile: ProfileFn,
    // Keeps the function pointers above valid
    _library: Library,
}

impl NativeRecorder {
    /// Open a shared library and resolve both entry points
    pub fn open(path: &Path) -> Result<Self, BridgeError> {
        // SAFETY: loading runs the library's initializers; the recorder is a
        // trusted component configured by the operator.
        let library = unsafe { Library::new(path) }.map_err(|e| BridgeError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let record = resolve::<RecordFn>(&library, path, RECORD_SYMBOL)?;
        let profile = resolve::<ProfileFn>(&library, path, PROFILE_SYMBOL)?;

        Ok(Self {
            record,
            profile,
            _library: library,
        })
    }
}

fn resolve<T: Copy>(library: &Library, path: &Path, symbol: &[u8]) -> Result<T, BridgeError> {
    // SAFETY: T is the declared C signature of the exported symbol.
    unsafe { library.get::<T>(symbol) }
        .map(|sym| *sym)
        .map_err(|_| BridgeError::MissingSymbol {
            path: path.to_path_buf(),
            symbol: String::from_utf8_lossy(&symbol[..symbol.len() - 1]).into_owned(),
        })
}

impl Recorder for NativeRecorder {
    #[inline]
    fn record(&self, id: ProbeId) {
        // SAFETY: resolved from the library held by self.
        unsafe { (self.record)(id.as_u32()) }
    }

    fn profile(&self, probes: &ProbeSet) {
        let names: Vec<CString> = probes
            .iter()
            .map(|p| CString::new(p.name.replace('\0', "")).unwrap_or_default())
            .collect();
        let entries: Vec<NativeProbe> = probes
            .iter()
            .zip(&names)
            .map(|(p, name)| NativeProbe {
                id: p.id.as_u32(),
                name: name.as_ptr(),
            })
            .collect();

        // SAFETY: entries and the names they point to outlive the call.
        unsafe { (self.profile)(entries.as_ptr(), entries.len()) }
    }
}

/// Strategy for turning a located module file into a recorder
pub trait ModuleLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn Recorder>, BridgeError>;
}

/// Loads the recorder with `dlopen` semantics
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibLoader;

impl ModuleLoader for DylibLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn Recorder>, BridgeError> {
        Ok(Box::new(NativeRecorder::open(path)?))
    }
}

/// A loaded native recorder
pub struct NativeBridge {
    path: PathBuf,
    recorder: Box<dyn Recorder>,
}

impl NativeBridge {
    /// Path of the module the recorder was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn recorder(&self) -> &dyn Recorder {
        self.recorder.as_ref()
    }

    #[inline]
    pub fn record(&self, id: ProbeId) {
        self.recorder.record(id);
    }

    pub fn profile(&self, probes: &ProbeSet) {
        self.recorder.profile(probes);
    }
}

impl std::fmt::Debug for NativeBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBridge").field("path", &self.path).finish()
    }
}

/// Process-scoped owner of the native bridge
pub struct BridgeContext {
    search_path: Vec<PathBuf>,
    module: String,
    loader: Box<dyn ModuleLoader>,
    bridge: OnceLock<NativeBridge>,
    init: Mutex<()>,
}

impl BridgeContext {
    /// Context that loads the default module with [`DylibLoader`]
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        Self::with_loader(search_path, default_module_name(), Box::new(DylibLoader))
    }

    pub fn with_loader(
        search_path: Vec<PathBuf>,
        module: impl Into<String>,
        loader: Box<dyn ModuleLoader>,
    ) -> Self {
        Self {
            search_path,
            module: module.into(),
            loader,
            bridge: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn is_loaded(&self) -> bool {
        self.bridge.get().is_some()
    }

    /// Get the bridge, loading the native module on first use
    pub fn bridge(&self) -> Result<&NativeBridge, BridgeError> {
        if let Some(bridge) = self.bridge.get() {
            return Ok(bridge);
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bridge) = self.bridge.get() {
            return Ok(bridge);
        }

        let bridge = self.locate_and_load()?;
        Ok(self.bridge.get_or_init(move || bridge))
    }

    fn locate_and_load(&self) -> Result<NativeBridge, BridgeError> {
        for dir in &self.search_path {
            let candidate = dir.join(&self.module);
            if !candidate.is_file() {
                debug!(path = %candidate.display(), "native recorder not present");
                continue;
            }

            let recorder = self.loader.load(&candidate)?;
            info!(path = %candidate.display(), "loaded native recorder");
            return Ok(NativeBridge {
                path: candidate,
                recorder,
            });
        }

        Err(BridgeError::NotFound {
            module: self.module.clone(),
            searched: self.search_path.clone(),
        })
    }
}

impl std::fmt::Debug for BridgeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeContext")
            .field("search_path", &self.search_path)
            .field("module", &self.module)
            .field("bridge", &self.bridge.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct NullRecorder;

    impl Recorder for NullRecorder {
        fn record(&self, _id: ProbeId) {}
        fn profile(&self, _probes: &ProbeSet) {}
    }

    #[derive(Default)]
    struct CountingLoader {
        loads: Arc<AtomicUsize>,
    }

    impl ModuleLoader for CountingLoader {
        fn load(&self, _path: &Path) -> Result<Box<dyn Recorder>, BridgeError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NullRecorder))
        }
    }

    #[test]
    fn test_default_module_name_mentions_xpedite() {
        assert!(default_module_name().contains("xpedite"));
        assert!(!default_module_name().contains("JNI"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_default_module_name_on_linux() {
        assert_eq!(default_module_name(), "libxpedite.so");
    }

    #[test]
    fn test_loads_from_first_matching_directory() {
        let empty = TempDir::new().unwrap();
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(first.path().join("librec.so"), b"").unwrap();
        fs::write(second.path().join("librec.so"), b"").unwrap();

        let loader = CountingLoader::default();
        let loads = loader.loads.clone();
        let ctx = BridgeContext::with_loader(
            vec![
                empty.path().to_path_buf(),
                first.path().to_path_buf(),
                second.path().to_path_buf(),
            ],
            "librec.so",
            Box::new(loader),
        );

        let bridge = ctx.bridge().unwrap();
        assert_eq!(bridge.path(), first.path().join("librec.so"));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_directory_with_module_name_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("librec.so")).unwrap();

        let ctx = BridgeContext::with_loader(
            vec![dir.path().to_path_buf()],
            "librec.so",
            Box::new(CountingLoader::default()),
        );
        assert!(matches!(ctx.bridge(), Err(BridgeError::NotFound { .. })));
    }

    #[test]
    fn test_not_found_leaves_context_unloaded() {
        let dir = TempDir::new().unwrap();
        let ctx = BridgeContext::with_loader(
            vec![dir.path().to_path_buf()],
            "librec.so",
            Box::new(CountingLoader::default()),
        );

        match ctx.bridge() {
            Err(BridgeError::NotFound { module, searched }) => {
                assert_eq!(module, "librec.so");
                assert_eq!(searched, vec![dir.path().to_path_buf()]);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(!ctx.is_loaded());

        // A later call sees the module once it appears
        fs::write(dir.path().join("librec.so"), b"").unwrap();
        assert!(ctx.bridge().is_ok());
        assert!(ctx.is_loaded());
    }

    #[test]
    fn test_empty_search_path_fails() {
        let ctx = BridgeContext::with_loader(
            Vec::new(),
            "librec.so",
            Box::new(CountingLoader::default()),
        );
        assert!(matches!(ctx.bridge(), Err(BridgeError::NotFound { .. })));
    }

    #[test]
    fn test_dylib_loader_rejects_non_library() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("libxpedite.so");
        fs::write(&path, b"not an ELF object").unwrap();

        match DylibLoader.load(&path) {
            Err(BridgeError::Open { path: failed, .. }) => assert_eq!(failed, path),
            Err(other) => panic!("expected Open error, got {:?}", other),
            Ok(_) => panic!("garbage file must not load"),
        }
    }

    #[test]
    fn test_native_probe_layout() {
        assert_eq!(
            std::mem::size_of::<NativeProbe>(),
            std::mem::size_of::<usize>() * 2
        );
    }
}
