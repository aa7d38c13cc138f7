//! Where the host keeps its log and socket, and the optional user settings file.

use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};

/// Application directory name used under every platform base directory.
pub const APP_DIR: &str = "open-in-mpv";
/// File name of the coordination socket (Unix).
pub const SOCKET_FILE: &str = "open-in-mpv.sock";
/// Named pipe used as the coordination endpoint on Windows.
pub const WINDOWS_PIPE: &str = r"\\.\pipe\open-in-mpv";
/// Host log file name.
pub const HOST_LOG_FILE: &str = "main.log";
/// Player log file name.
pub const PLAYER_LOG_FILE: &str = "mpv.log";

/// Overrides the log directory.
pub const LOG_DIR_ENV: &str = "OPEN_IN_MPV_LOG_DIR";
/// Overrides the coordination socket path.
pub const SOCKET_ENV: &str = "OPEN_IN_MPV_SOCKET";
/// Overrides the settings file path.
pub const CONFIG_ENV: &str = "OPEN_IN_MPV_CONFIG";

/// Resolved filesystem locations for one invocation.
///
/// The `*_fallback` flags record that a platform directory was unavailable and
/// a per-user temp directory was used instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    pub log_dir: PathBuf,
    pub log_path: PathBuf,
    pub player_log_path: PathBuf,
    pub socket_path: PathBuf,
    pub log_fallback: bool,
    pub socket_fallback: bool,
}

impl HostPaths {
    /// Resolve paths from the environment and platform directories.
    pub fn resolve() -> Self {
        let (log_dir, log_fallback) = match env_path(LOG_DIR_ENV) {
            Some(dir) => (dir, false),
            None => match platform_log_dir() {
                Some(dir) => (dir, false),
                None => (fallback_dir().join("log"), true),
            },
        };
        let (socket_path, socket_fallback) = match env_path(SOCKET_ENV) {
            Some(path) => (path, false),
            None => match platform_socket_path() {
                Some(path) => (path, false),
                None => (fallback_dir().join(SOCKET_FILE), true),
            },
        };
        Self::from_parts(log_dir, socket_path, log_fallback, socket_fallback)
    }

    /// Everything under a single directory. Used by tests and by callers that
    /// manage their own layout.
    pub fn in_dir(dir: &Path) -> Self {
        Self::from_parts(dir.to_path_buf(), dir.join(SOCKET_FILE), false, false)
    }

    fn from_parts(
        log_dir: PathBuf,
        socket_path: PathBuf,
        log_fallback: bool,
        socket_fallback: bool,
    ) -> Self {
        Self {
            log_path: log_dir.join(HOST_LOG_FILE),
            player_log_path: log_dir.join(PLAYER_LOG_FILE),
            log_dir,
            socket_path,
            log_fallback,
            socket_fallback,
        }
    }

    /// Create the log directory and the socket's parent directory.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.log_dir)?;
        if cfg!(not(windows)) {
            if let Some(parent) = self.socket_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(target_os = "macos")]
fn platform_log_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join("Library/Logs").join(APP_DIR))
}

#[cfg(windows)]
fn platform_log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join(APP_DIR).join("Logs"))
}

#[cfg(not(any(target_os = "macos", windows)))]
fn platform_log_dir() -> Option<PathBuf> {
    dirs::state_dir().map(|d| d.join(APP_DIR).join("log"))
}

#[cfg(target_os = "macos")]
fn platform_socket_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join(APP_DIR).join(SOCKET_FILE))
}

#[cfg(windows)]
fn platform_socket_path() -> Option<PathBuf> {
    Some(PathBuf::from(WINDOWS_PIPE))
}

#[cfg(not(any(target_os = "macos", windows)))]
fn platform_socket_path() -> Option<PathBuf> {
    dirs::runtime_dir().map(|d| d.join(APP_DIR).join(SOCKET_FILE))
}

fn fallback_dir() -> PathBuf {
    std::env::temp_dir().join(format!("{APP_DIR}-{}", user_tag()))
}

#[cfg(unix)]
fn user_tag() -> String {
    // SAFETY: getuid has no preconditions and cannot fail.
    unsafe { libc::getuid() }.to_string()
}

#[cfg(not(unix))]
fn user_tag() -> String {
    std::env::var("USERNAME").unwrap_or_else(|_| "user".to_string())
}

/// Optional user settings, read from `config.toml`.
///
/// ```toml
/// mpv = "/usr/local/bin/mpv"
/// extra_args = ["--ontop"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Player executable; searched on `PATH` when unset.
    pub mpv: Option<PathBuf>,
    /// Inserted before the URL on every player launch.
    pub extra_args: Vec<String>,
}

impl Settings {
    /// Default location of the settings file.
    pub fn default_path() -> Option<PathBuf> {
        env_path(CONFIG_ENV).or_else(|| dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml")))
    }

    /// Parse settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Self::from_toml(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load from the default location; problems are logged and defaults used.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        match Self::from_file(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring settings file {}: {e:#}", path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_dir_lays_out_files() {
        let p = HostPaths::in_dir(Path::new("/x"));
        assert_eq!(p.log_path, Path::new("/x/main.log"));
        assert_eq!(p.player_log_path, Path::new("/x/mpv.log"));
        assert_eq!(p.socket_path, Path::new("/x/open-in-mpv.sock"));
        assert!(!p.log_fallback && !p.socket_fallback);
    }

    #[test]
    fn settings_parse() {
        let s = Settings::from_toml("mpv = \"/opt/mpv\"\nextra_args = [\"--ontop\"]\n").unwrap();
        assert_eq!(s.mpv.as_deref(), Some(Path::new("/opt/mpv")));
        assert_eq!(s.extra_args, vec!["--ontop".to_string()]);
        assert!(Settings::from_toml("bogus = 1").is_err());
    }

    #[test]
    fn missing_settings_file_is_default() {
        let td = tempfile::tempdir().unwrap();
        let s = Settings::from_file(&td.path().join("config.toml")).unwrap();
        assert_eq!(s, Settings::default());
    }
}
