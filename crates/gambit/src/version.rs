//! Version information for gambit.

/// Gambit version from Cargo.toml
pub const GAMBIT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version information reported on the health endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VersionInfo {
    pub gambit: &'static str,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            gambit: GAMBIT_VERSION,
        }
    }
}

impl VersionInfo {
    pub fn new() -> Self {
        Self::default()
    }
}
