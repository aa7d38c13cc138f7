//! `open-in-mpv`: the native messaging host launched by the browser.

use clap::Parser;
use open_in_mpv::config::{HostPaths, Settings};
use open_in_mpv::detach::DetachedLauncher;
use open_in_mpv::dispatch::{dispatch, HostContext};
use open_in_mpv::host::{self, VERSION};
use open_in_mpv::transport::platform_transport;
use open_in_mpv::{logging, Outcome};
use std::io;
use std::process::ExitCode;

/// Open a URL in mpv.
///
/// Standard input carries a single native-messaging frame: a 4-byte native-endian
/// length followed by a JSON object with `url`, `debug`, `single` (or `init`).
#[derive(Parser, Debug)]
#[command(
    name = "open-in-mpv",
    version = VERSION,
    before_help = "This program is intended to be used with the browser extension. \
                   There is no CLI interface for general use."
)]
struct Cli {
    /// Arguments the browser passes (extension origin, or manifest path and add-on ID).
    browser_args: Vec<String>,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,

    /// Passed by Chrome on Windows.
    #[arg(long = "parent-window", hide = true)]
    parent_window: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let paths = HostPaths::resolve();
    let dirs_ready = paths.ensure_dirs();

    let request = host::decode_request(&mut io::stdin().lock());
    let debug_on = cli.debug || matches!(&request, Ok(r) if r.debug);
    logging::init(&paths, debug_on);

    if let Err(e) = dirs_ready {
        tracing::warn!("Could not create runtime directories: {e}");
    }
    if paths.log_fallback || paths.socket_fallback {
        tracing::info!(
            "Using temporary directories (log: {}, socket: {}).",
            paths.log_fallback,
            paths.socket_fallback
        );
    }
    tracing::debug!("Arguments: {:?}", cli.browser_args);

    let request = match request {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!("Decoded message: {request:?}");
    tracing::info!(
        "Single instance mode {}.",
        if request.single { "enabled" } else { "disabled" }
    );
    tracing::info!(
        "Debug mode {}.",
        if debug_on { "enabled" } else { "disabled" }
    );

    let ctx = HostContext::from_process(paths, Settings::load());
    let transport = platform_transport();
    let mut launcher = DetachedLauncher;
    let mut stdout = io::stdout();

    match dispatch(&request, &mut stdout, &ctx, &transport, &mut launcher) {
        Ok(Outcome::Initialized) => ExitCode::SUCCESS,
        Ok(outcome) => {
            tracing::debug!("mpv should open soon ({outcome:?}).");
            tracing::debug!("Exiting with status 0.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
