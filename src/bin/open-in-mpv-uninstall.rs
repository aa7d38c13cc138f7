//! `open-in-mpv-uninstall`: delete the native messaging manifests.

use clap::Parser;
use open_in_mpv::install::{self, paths, InstallError, Scope};
use open_in_mpv::logging;
use std::process::ExitCode;

/// Uninstall open-in-mpv native host files.
#[derive(Parser, Debug)]
#[command(name = "open-in-mpv-uninstall", version = open_in_mpv::host::VERSION)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,
}

fn run() -> anyhow::Result<()> {
    let browsers = paths::browser_keys()?;
    match install::remove(&browsers, Scope::System) {
        Ok(removed) => removed
            .iter()
            .for_each(|p| tracing::info!("Removed {}.", p.display())),
        Err(InstallError::PermissionDenied { path }) => {
            tracing::debug!("Permission denied: {}", path.display());
            eprintln!("To delete files installed in /etc, run this as root.");
        }
        Err(e) => return Err(e.into()),
    }
    for path in install::remove(&browsers, Scope::User)? {
        tracing::info!("Removed {}.", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_console(cli.debug);
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
