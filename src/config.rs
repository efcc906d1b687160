//! Agent configuration
//!
//! Loaded from a TOML file or from the environment:
//!
//! ```toml
//! library_path = ["/opt/xpedite/lib", "/usr/local/lib"]
//! module_name = "libxpedite.so"
//! appinfo_path = "/tmp/xpedite-appinfo.toml"
//! ```

use crate::bridge::default_module_name;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Directories searched for the native recorder
pub const LIBRARY_PATH_ENV: &str = "XPEDITE_LIBRARY_PATH";

/// Consulted when `XPEDITE_LIBRARY_PATH` is unset
pub const FALLBACK_LIBRARY_PATH_ENV: &str = "LD_LIBRARY_PATH";

/// Where to write the app info file
pub const APPINFO_ENV: &str = "XPEDITE_APPINFO";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Directories searched, in order, for the native recorder
    pub library_path: Vec<PathBuf>,

    /// Recorder file name; defaults to the platform name for `xpedite`
    pub module_name: Option<String>,

    /// App info output; none disables the file
    pub appinfo_path: Option<PathBuf>,
}

impl AgentConfig {
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read agent config: {}", path.as_ref().display())
        })?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse agent config: {}", path.as_ref().display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        let library_path = env::var_os(LIBRARY_PATH_ENV)
            .or_else(|| env::var_os(FALLBACK_LIBRARY_PATH_ENV))
            .map(|paths| {
                env::split_paths(&paths)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            library_path,
            module_name: None,
            appinfo_path: env::var_os(APPINFO_ENV).map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn module_name(&self) -> String {
        self.module_name.clone().unwrap_or_else(default_module_name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.library_path.is_empty() {
            bail!("library path is empty; set {} or library_path", LIBRARY_PATH_ENV);
        }
        if let Some(name) = &self.module_name {
            if name.is_empty() || name.contains(std::path::MAIN_SEPARATOR) {
                bail!("module_name must be a bare file name, got '{}'", name);
            }
        }
        Ok(())
    }
}
