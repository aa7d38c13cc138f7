//! One request in, at most one response out.

use crate::config::{HostPaths, Settings};
use crate::coordinator::{validate_url, Coordinator, Outcome, Playback};
use crate::detach::Launcher;
use crate::env::{self, MACPORTS_BIN_PATH};
use crate::error::HostResult;
use crate::host::{self, AckResponse, InitResponse, Request, Response, ACK_MESSAGE, VERSION};
use crate::transport::IpcTransport;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Everything a request is evaluated against.
#[derive(Debug, Clone)]
pub struct HostContext {
    pub paths: HostPaths,
    pub settings: Settings,
    /// Environment the player environment is derived from.
    pub base_env: BTreeMap<String, String>,
    /// Prepended to the player's `PATH` when it exists.
    pub alternate_bin: PathBuf,
}

impl HostContext {
    /// Context for the running process.
    pub fn from_process(paths: HostPaths, settings: Settings) -> Self {
        Self {
            paths,
            settings,
            base_env: env::current_environment(),
            alternate_bin: PathBuf::from(MACPORTS_BIN_PATH),
        }
    }
}

/// Read one request from `input` and [`dispatch`] it.
pub fn serve_one<R, W, T, L>(
    input: &mut R,
    output: &mut W,
    ctx: &HostContext,
    transport: &T,
    launcher: &mut L,
) -> HostResult<Outcome>
where
    R: Read,
    W: Write,
    T: IpcTransport,
    L: Launcher,
{
    let request = host::decode_request(input)?;
    dispatch(&request, output, ctx, transport, launcher)
}

/// Answer `init`, or acknowledge the URL and hand it to the coordinator.
///
/// Nothing is written when the URL is missing or rejected. When it is
/// accepted, the acknowledgement is flushed before the socket or the player is
/// touched: the extension only learns that the request was accepted, not that
/// the player is up.
pub fn dispatch<W, T, L>(
    request: &Request,
    output: &mut W,
    ctx: &HostContext,
    transport: &T,
    launcher: &mut L,
) -> HostResult<Outcome>
where
    W: Write,
    T: IpcTransport,
    L: Launcher,
{
    let log_path = ctx.paths.log_path.display().to_string();
    if request.init {
        let resp = InitResponse {
            version: VERSION.to_string(),
            log_path,
            socket_path: ctx.paths.socket_path.display().to_string(),
        };
        host::encode_response(output, &Response::Init(resp))?;
        return Ok(Outcome::Initialized);
    }

    let url = validate_url(request.url.as_deref())?;

    let (player_env, used_alternate) = env::build_environment_with(&ctx.base_env, &ctx.alternate_bin);
    if request.debug {
        env::log_environment(&player_env);
    }
    let ack = AckResponse {
        version: VERSION.to_string(),
        log_path,
        message: ACK_MESSAGE.to_string(),
        env: player_env.clone(),
        macports: used_alternate.then_some(true),
    };
    tracing::debug!("About to spawn.");
    host::encode_response(output, &Response::Ack(ack))?;

    let playback = Playback {
        url,
        debug: request.debug,
        single: request.single,
        env: player_env,
    };
    Coordinator::new(transport, launcher, &ctx.paths, &ctx.settings).run(playback)
}
