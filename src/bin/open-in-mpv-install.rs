//! `open-in-mpv-install`: write the native messaging manifests.

use anyhow::{bail, Context};
use clap::Parser;
use open_in_mpv::install::{self, paths, Scope};
use open_in_mpv::logging;
use std::path::PathBuf;
use std::process::ExitCode;

/// Install open-in-mpv native host files for the browser extension.
#[derive(Parser, Debug)]
#[command(
    name = "open-in-mpv-install",
    version = open_in_mpv::host::VERSION,
    after_help = "Please fully exit your browser(s) to ensure successful installation."
)]
struct Cli {
    /// Install user native host JSON files.
    #[arg(short, long)]
    user: bool,

    /// Install system native host JSON files.
    #[arg(short, long)]
    system: bool,

    /// Install user native host JSON files even if the path does not yet exist.
    #[arg(short, long)]
    force: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,
}

/// The installed host binary: on `PATH`, or next to this installer.
fn host_executable() -> anyhow::Result<PathBuf> {
    if let Ok(path) = which::which("open-in-mpv") {
        return Ok(path);
    }
    let exe = std::env::current_exe().context("cannot locate the running executable")?;
    let sibling = exe.with_file_name(format!("open-in-mpv{}", std::env::consts::EXE_SUFFIX));
    if sibling.is_file() {
        return Ok(sibling);
    }
    bail!("open-in-mpv not found in PATH.")
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    if !cli.user && !cli.system {
        bail!("Need an action.");
    }
    let exe = host_executable()?;
    tracing::debug!("Host executable: {}", exe.display());

    let browsers = paths::browser_keys()?;
    let scopes = [(cli.system, Scope::System), (cli.user, Scope::User)];
    for scope in scopes.iter().filter(|(on, _)| *on).map(|(_, s)| *s) {
        let written = install::install(&exe, &browsers, scope, cli.force)
            .with_context(|| format!("{scope} installation failed"))?;
        if written.is_empty() {
            tracing::warn!("No {scope} manifest directories found. Use --force to create them.");
        }
        for path in written {
            tracing::info!("Wrote {}.", path.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_console(cli.debug);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
