//! `open-in-mpv-test`: drive the host the way the browser does.

use anyhow::{bail, Context};
use clap::Parser;
use open_in_mpv::host::encode_message;
use open_in_mpv::logging;
use serde_json::json;
use std::io::Write;
use std::path::Path;
use std::process::{Command, ExitCode, Stdio};

/// Test the `open-in-mpv` command.
///
/// Sends an `init` message, then the URL, each to a fresh host process.
#[derive(Parser, Debug)]
#[command(name = "open-in-mpv-test", version = open_in_mpv::host::VERSION)]
struct Cli {
    /// URL to open.
    url: String,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,
}

/// Run the host once with `message` on stdin. Returns whether it succeeded.
fn send(host: &Path, debug: bool, message: &serde_json::Value) -> anyhow::Result<bool> {
    let mut cmd = Command::new(host);
    cmd.arg("chrome://nothing");
    if debug {
        cmd.arg("-d");
    }
    tracing::debug!("Running: {cmd:?}");
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .with_context(|| format!("cannot run {}", host.display()))?;

    let frame = encode_message(message)?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(&frame)?;
    }
    let output = child.wait_with_output()?;
    tracing::debug!("Host replied with {} bytes.", output.stdout.len());
    Ok(output.status.success())
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let Ok(host) = which::which("open-in-mpv") else {
        bail!("open-in-mpv not found in PATH.");
    };
    tracing::debug!("open-in-mpv path: {}", host.display());

    let init_ok = send(&host, cli.debug, &json!({"init": true}))?;
    let open_ok = send(&host, cli.debug, &json!({"url": cli.url, "debug": cli.debug}))?;
    if !(init_ok && open_ok) {
        bail!("open-in-mpv exited with an error.");
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
