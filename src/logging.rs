//! Tracing setup. Stdout carries protocol frames, so logs go to `main.log`
//! and, in debug mode, to stderr.

use crate::config::HostPaths;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Overrides the level chosen from the debug flag.
pub const LOG_LEVEL_ENV: &str = "OPEN_IN_MPV_LOG";

/// `main.log` is rotated once it grows past this.
pub const MAX_LOG_BYTES: u64 = 1_048_576;

static INIT: OnceLock<()> = OnceLock::new();

fn parse_level(debug: bool) -> LevelFilter {
    let default = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    match std::env::var(LOG_LEVEL_ENV)
        .unwrap_or_default()
        .to_ascii_lowercase()
        .as_str()
    {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => default,
    }
}

/// Path of the single kept backup of `log`.
pub fn backup_path(log: &Path) -> PathBuf {
    let mut name = log.file_name().unwrap_or_default().to_os_string();
    name.push(".1");
    log.with_file_name(name)
}

/// Move `log` aside to its backup when it exceeds `max_bytes`.
pub fn rotate_if_needed(log: &Path, max_bytes: u64) -> io::Result<bool> {
    match std::fs::metadata(log) {
        Ok(meta) if meta.len() > max_bytes => {
            std::fs::rename(log, backup_path(log))?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn open_log(log: &Path) -> io::Result<File> {
    if let Some(parent) = log.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Err(e) = rotate_if_needed(log, MAX_LOG_BYTES) {
        eprintln!("open-in-mpv: could not rotate {}: {e}", log.display());
    }
    OpenOptions::new().create(true).append(true).open(log)
}

/// Initialise process-wide logging for the host.
///
/// Safe to call more than once; only the first call installs a subscriber.
/// If the log file cannot be opened, logs go to stderr instead.
pub fn init(paths: &HostPaths, debug: bool) {
    if INIT.get().is_some() {
        return;
    }
    let file = match open_log(&paths.log_path) {
        Ok(f) => Some(f),
        Err(e) => {
            eprintln!("open-in-mpv: cannot open {}: {e}", paths.log_path.display());
            None
        }
    };
    let to_stderr = debug || file.is_none();

    let file_layer = file.map(|f| {
        fmt::layer()
            .with_writer(Mutex::new(f))
            .with_ansi(false)
            .with_line_number(true)
    });
    let stderr_layer = to_stderr.then(|| fmt::layer().with_writer(io::stderr));

    let _ = tracing_subscriber::registry()
        .with(parse_level(debug))
        .with(file_layer)
        .with(stderr_layer)
        .try_init();
    let _ = INIT.set(());
}

/// Stderr-only logging for the installer and test tools.
pub fn init_console(debug: bool) {
    if INIT.get().is_some() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_max_level(parse_level(debug))
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
    let _ = INIT.set(());
}
