//! Building the mpv invocation.
//!
//! The flags are configuration rather than protocol; the only ones the host
//! depends on are `--input-ipc-server`, which makes the new player listen on the
//! coordination socket, and the URL, which always comes last.

use crate::config::{HostPaths, Settings};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

#[cfg(windows)]
const MPV_EXE: &str = "mpv.exe";
#[cfg(not(windows))]
const MPV_EXE: &str = "mpv";

/// A fully resolved player launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// stdout/stderr of the player are appended here.
    pub log_path: PathBuf,
    /// Removed once the player exits.
    pub socket_path: PathBuf,
}

impl PlayerCommand {
    /// Build the launch for `url`.
    pub fn new(
        url: &str,
        debug: bool,
        paths: &HostPaths,
        settings: &Settings,
        env: BTreeMap<String, String>,
    ) -> Self {
        let program = mpv_executable(settings);
        let mut args = Vec::new();
        if cfg!(not(windows)) {
            args.push("--gpu-api=opengl".to_string());
        }
        args.push("--player-operation-mode=pseudo-gui".to_string());
        if debug {
            args.push("-v".to_string());
            args.push(format!("--log-file={}", paths.player_log_path.display()));
        } else {
            args.push("--quiet".to_string());
        }
        args.push(format!("--input-ipc-server={}", paths.socket_path.display()));
        if let Some(ytdlp) = bundled_sibling("yt-dlp.exe") {
            tracing::debug!("Using bundled yt-dlp at: {}", ytdlp.display());
            args.push("--ytdl=yes".to_string());
            args.push(format!("--script-opts=ytdl_hook-ytdl_path={}", ytdlp.display()));
        }
        args.extend(settings.extra_args.iter().cloned());
        args.push(url.to_string());

        Self {
            program,
            args,
            env,
            log_path: paths.player_log_path.clone(),
            socket_path: paths.socket_path.clone(),
        }
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<OsString> {
        std::iter::once(self.program.clone().into_os_string())
            .chain(self.args.iter().map(OsString::from))
            .collect()
    }

    /// Shell-ish rendering for logs.
    pub fn display(&self) -> String {
        self.argv()
            .iter()
            .map(|a| {
                let a = a.to_string_lossy();
                if a.contains(char::is_whitespace) {
                    format!("'{a}'")
                } else {
                    a.into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// A `Command` with the player environment applied; stdio is left to the caller.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).env_clear().envs(&self.env);
        cmd
    }
}

/// Resolve the mpv executable: settings, then a copy bundled next to the host
/// (Windows installers ship one), then `PATH`.
pub fn mpv_executable(settings: &Settings) -> PathBuf {
    if let Some(mpv) = &settings.mpv {
        return mpv.clone();
    }
    if let Some(bundled) = bundled_sibling(MPV_EXE) {
        tracing::debug!("Using bundled mpv at: {}", bundled.display());
        return bundled;
    }
    PathBuf::from(MPV_EXE)
}

/// A file shipped next to the host executable. Only Windows bundles are
/// looked for.
fn bundled_sibling(name: &str) -> Option<PathBuf> {
    if cfg!(not(windows)) {
        return None;
    }
    let exe = std::env::current_exe().ok()?;
    sibling_of(&exe, name)
}

fn sibling_of(exe: &Path, name: &str) -> Option<PathBuf> {
    let candidate = exe.parent()?.join(name);
    candidate.exists().then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> HostPaths {
        HostPaths::in_dir(Path::new("/run/u"))
    }

    fn command(debug: bool, settings: &Settings) -> PlayerCommand {
        PlayerCommand::new("https://example.com/v", debug, &paths(), settings, BTreeMap::new())
    }

    #[test]
    fn url_is_last_and_socket_is_passed() {
        let cmd = command(false, &Settings::default());
        assert_eq!(cmd.args.last().map(String::as_str), Some("https://example.com/v"));
        let ipc = format!("--input-ipc-server={}", paths().socket_path.display());
        assert!(cmd.args.contains(&ipc));
        assert!(cmd.args.contains(&"--quiet".to_string()));
        assert!(!cmd.args.iter().any(|a| a.starts_with("--log-file")));
    }

    #[test]
    fn debug_is_verbose_and_logs_to_file() {
        let cmd = command(true, &Settings::default());
        assert!(cmd.args.contains(&"-v".to_string()));
        let log = format!("--log-file={}", paths().player_log_path.display());
        assert!(cmd.args.contains(&log));
        assert_eq!(cmd.args.last().map(String::as_str), Some("https://example.com/v"));
    }

    #[test]
    fn settings_override_program_and_add_args() {
        let settings = Settings {
            mpv: Some(PathBuf::from("/opt/mpv/bin/mpv")),
            extra_args: vec!["--ontop".to_string()],
        };
        let cmd = command(false, &settings);
        assert_eq!(cmd.program, PathBuf::from("/opt/mpv/bin/mpv"));
        let n = cmd.args.len();
        assert_eq!(cmd.args[n - 2], "--ontop");
        assert_eq!(cmd.argv()[0], OsString::from("/opt/mpv/bin/mpv"));
    }

    #[test]
    fn sibling_lookup() {
        let td = tempfile::tempdir().unwrap();
        let exe = td.path().join("open-in-mpv");
        assert_eq!(sibling_of(&exe, "mpv.exe"), None);
        std::fs::write(td.path().join("mpv.exe"), b"").unwrap();
        assert_eq!(sibling_of(&exe, "mpv.exe"), Some(td.path().join("mpv.exe")));
    }
}
