//! Child-process environment for the player.

use std::collections::BTreeMap;
use std::path::Path;

/// MacPorts installs mpv and yt-dlp here, which is not on the PATH a browser
/// hands to its native hosts.
pub const MACPORTS_BIN_PATH: &str = "/opt/local/bin";

#[cfg(windows)]
const PATH_SEPARATOR: char = ';';
#[cfg(not(windows))]
const PATH_SEPARATOR: char = ':';

/// Copy of the current process environment. Variables that are not valid
/// Unicode are skipped since they cannot be reported back as JSON strings.
pub fn current_environment() -> BTreeMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Build the player environment from `base_env`, prefixing `PATH` with the
/// MacPorts bin directory when it exists.
pub fn build_environment(base_env: &BTreeMap<String, String>) -> (BTreeMap<String, String>, bool) {
    build_environment_with(base_env, Path::new(MACPORTS_BIN_PATH))
}

/// [`build_environment`] with an explicit alternate directory.
pub fn build_environment_with(
    base_env: &BTreeMap<String, String>,
    alternate_bin: &Path,
) -> (BTreeMap<String, String>, bool) {
    let mut env = base_env.clone();
    if !alternate_bin.is_dir() {
        return (env, false);
    }
    tracing::info!("Detected {}. Setting PATH.", alternate_bin.display());
    let dir = alternate_bin.to_string_lossy().into_owned();
    let path = match base_env.get("PATH").filter(|p| !p.is_empty()) {
        Some(old) => format!("{dir}{PATH_SEPARATOR}{old}"),
        None => dir,
    };
    env.insert("PATH".to_string(), path);
    (env, true)
}

/// Dump every variable at debug level.
pub fn log_environment(env: &BTreeMap<String, String>) {
    tracing::debug!("Environment:");
    for (k, v) in env {
        tracing::debug!("  {k}={v}");
    }
}
