//! Registering the host with browsers.

pub mod manifest;
pub mod paths;

#[cfg(all(windows, feature = "windows-registry"))]
pub mod winreg;

use std::path::PathBuf;
use thiserror::Error;

pub use manifest::{host_name, install, remove, verify_installed, Manifest};
pub use paths::{Family, Scope};

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("unknown browser `{0}`")]
    UnknownBrowser(String),

    #[error("{browser} has no {scope} manifest location on this platform")]
    NotConfigured { browser: String, scope: Scope },

    #[error("could not determine the home directory")]
    NoHomeDir,

    #[error("embedded browser table is invalid: {0}")]
    Config(String),

    #[error("manifest path must be absolute: {}", .0.display())]
    RelativeExePath(PathBuf),

    #[error("system-wide installation requires root")]
    NeedsRoot,

    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
