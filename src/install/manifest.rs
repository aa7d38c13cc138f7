use super::paths::{self, Family, Scope};
use super::InstallError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Host name registered with Chromium-family browsers.
pub const CHROMIUM_HOST_NAME: &str = "sh.tat.open_in_mpv";
/// Host name registered with Firefox.
pub const FIREFOX_HOST_NAME: &str = "sh.tat.open-in-mpv";
pub const DESCRIPTION: &str = "Opens a URL in mpv (for use with extension).";
/// The published Chrome Web Store extension.
pub const CHROME_EXTENSION_ORIGIN: &str = "chrome-extension://jlhcojdohadhkchjpjefbmagpiaedpgc/";
/// The published Firefox add-on.
pub const FIREFOX_ADDON_ID: &str = "{43e6f3ef-84a0-55f4-b9dd-d879106a24a9}";

/// A native messaging manifest.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub description: String,
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_extensions: Option<Vec<String>>,
}

impl Manifest {
    /// The manifest a browser family expects for the host at `exe_path`.
    pub fn for_family(family: Family, exe_path: &Path) -> Self {
        let (allowed_origins, allowed_extensions) = match family {
            Family::Chromium => (Some(vec![CHROME_EXTENSION_ORIGIN.to_string()]), None),
            Family::Firefox => (None, Some(vec![FIREFOX_ADDON_ID.to_string()])),
        };
        Self {
            name: host_name(family).to_string(),
            description: DESCRIPTION.to_string(),
            path: exe_path.to_path_buf(),
            kind: "stdio".to_string(),
            allowed_origins,
            allowed_extensions,
        }
    }

    /// Pretty JSON with sorted keys and a trailing newline.
    pub fn to_json(&self) -> Result<String, InstallError> {
        // serde_json's default Map is ordered by key.
        let value = serde_json::to_value(self)?;
        let mut out = serde_json::to_string_pretty(&value)?;
        out.push('\n');
        Ok(out)
    }
}

pub fn host_name(family: Family) -> &'static str {
    match family {
        Family::Chromium => CHROMIUM_HOST_NAME,
        Family::Firefox => FIREFOX_HOST_NAME,
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> InstallError + '_ {
    move |source| match source.kind() {
        io::ErrorKind::PermissionDenied => InstallError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => InstallError::Io {
            path: path.to_path_buf(),
            source,
        },
    }
}

#[cfg(unix)]
fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_root() -> bool {
    true
}

/// Manifest file location for `browser`, or `None` when the browser has no
/// location for this platform and scope.
fn target(browser: &str, scope: Scope) -> Result<Option<(Family, PathBuf)>, InstallError> {
    let family = paths::browser_info(browser)?.family;
    match paths::manifest_path(browser, scope, host_name(family)) {
        Ok(p) => Ok(Some((family, p))),
        Err(InstallError::NotConfigured { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write manifests for `browsers`. Returns the files written.
///
/// In user scope a browser whose manifest directory does not exist yet is
/// skipped (it is probably not installed) unless `force` is set. System scope
/// always creates the directory and, on Unix, requires root.
pub fn install(
    exe_path: &Path,
    browsers: &[&str],
    scope: Scope,
    force: bool,
) -> Result<Vec<PathBuf>, InstallError> {
    if cfg!(unix) && !exe_path.is_absolute() {
        return Err(InstallError::RelativeExePath(exe_path.to_path_buf()));
    }
    if scope == Scope::System && !is_root() {
        return Err(InstallError::NeedsRoot);
    }

    let mut written = Vec::new();
    for &browser in browsers {
        let Some((family, manifest_file)) = target(browser, scope)? else {
            tracing::debug!("{browser} has no {scope} manifest location here, skipping.");
            continue;
        };
        let Some(dir) = manifest_file.parent() else {
            continue;
        };
        if scope == Scope::System || force {
            fs::create_dir_all(dir).map_err(io_err(dir))?;
        } else if !dir.is_dir() {
            tracing::debug!("{} does not exist, skipping {browser}.", dir.display());
            continue;
        }

        tracing::debug!("Writing to {}.", manifest_file.display());
        let json = Manifest::for_family(family, exe_path).to_json()?;
        fs::write(&manifest_file, json).map_err(io_err(&manifest_file))?;

        #[cfg(all(windows, feature = "windows-registry"))]
        if let Some(key) = paths::winreg_key_path(browser, host_name(family))? {
            super::winreg::write_manifest_reg(scope, &key, &manifest_file)
                .map_err(io_err(&manifest_file))?;
        }

        if !written.contains(&manifest_file) {
            written.push(manifest_file);
        }
    }
    Ok(written)
}

/// Delete manifests for `browsers`. Missing files are ignored. Returns the
/// files removed.
pub fn remove(browsers: &[&str], scope: Scope) -> Result<Vec<PathBuf>, InstallError> {
    let mut removed = Vec::new();
    for &browser in browsers {
        let Some((_family, manifest_file)) = target(browser, scope)? else {
            continue;
        };
        tracing::debug!("Deleting `{}`.", manifest_file.display());
        match fs::remove_file(&manifest_file) {
            Ok(()) => removed.push(manifest_file.clone()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&manifest_file)(e)),
        }

        #[cfg(all(windows, feature = "windows-registry"))]
        if let Some(key) = paths::winreg_key_path(browser, host_name(_family))? {
            super::winreg::remove_manifest_reg(scope, &key).map_err(io_err(&manifest_file))?;
        }
    }
    Ok(removed)
}

/// Whether a manifest exists for any of `browsers` (all known browsers when
/// `None`).
pub fn verify_installed(browsers: Option<&[&str]>, scope: Scope) -> Result<bool, InstallError> {
    let all;
    let browsers = match browsers {
        Some(b) => b,
        None => {
            all = paths::browser_keys()?;
            all.as_slice()
        }
    };
    for &browser in browsers {
        if let Some((_, manifest_file)) = target(browser, scope)? {
            if manifest_file.is_file() {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
