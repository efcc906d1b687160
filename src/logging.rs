//! Diagnostic output
//!
//! The agent logs through `tracing`. Embedding hosts that already installed a
//! subscriber keep theirs; otherwise `init_tracing` installs a stderr
//! formatter filtered by `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Install a stderr subscriber unless one is already set
///
/// `default_directive` applies when `RUST_LOG` is unset, e.g. `"xpedite_agent=info"`.
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
