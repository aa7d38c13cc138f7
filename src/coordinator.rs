//! Single-instance coordination: hand the URL to a running player, or start one.
//!
//! ```text
//! Idle -> Deciding -> Forwarding --ok--------------------> Done
//!                  |            \--fail: remove socket--\
//!                  \--------------> Spawning <----------/ -> Done
//! ```
//!
//! There is no locking between invocations. Two hosts racing on a missing
//! socket will both start a player; that is accepted.

use crate::config::{HostPaths, Settings};
use crate::detach::Launcher;
use crate::error::{HostError, HostResult, ValidationError};
use crate::player::PlayerCommand;
use crate::transport::{loadfile_command, IpcTransport, CONNECT_TIMEOUT};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// What to do with a validated URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Send `loadfile` to the player listening on the socket.
    Forward,
    /// Start a new player bound to the socket.
    Spawn,
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Answered an `init` request; no player involved.
    Initialized,
    /// A running player accepted the URL.
    Forwarded,
    /// A new player was detached.
    Spawned,
    /// The socket was stale; it was removed and a new player was detached.
    Respawned,
}

/// Accept only `http://` and `https://` URLs (anchored, as mpv's ytdl hook
/// and the extension expect).
pub fn validate_url(url: Option<&str>) -> Result<&str, ValidationError> {
    let url = url.ok_or(ValidationError::MissingUrl)?;
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url)
    } else {
        Err(ValidationError::UnsupportedScheme(url.to_string()))
    }
}

/// One playback request that passed validation.
#[derive(Debug, Clone)]
pub struct Playback<'a> {
    pub url: &'a str,
    pub debug: bool,
    pub single: bool,
    pub env: BTreeMap<String, String>,
}

/// Drives the forward/spawn decision for one request.
pub struct Coordinator<'a, T, L> {
    transport: &'a T,
    launcher: &'a mut L,
    paths: &'a HostPaths,
    settings: &'a Settings,
    timeout: Duration,
}

impl<'a, T: IpcTransport, L: Launcher> Coordinator<'a, T, L> {
    pub fn new(
        transport: &'a T,
        launcher: &'a mut L,
        paths: &'a HostPaths,
        settings: &'a Settings,
    ) -> Self {
        Self {
            transport,
            launcher,
            paths,
            settings,
            timeout: CONNECT_TIMEOUT,
        }
    }

    /// Override the connect/send bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn socket(&self) -> &Path {
        &self.paths.socket_path
    }

    /// Forward iff single-instance mode is on and something is at the socket path.
    pub fn decide(&self, single: bool) -> Action {
        if single && self.transport.exists(self.socket()) {
            Action::Forward
        } else {
            Action::Spawn
        }
    }

    /// Execute the decision. Transport failures never escape: they degrade to
    /// spawning a fresh player.
    pub fn run(&mut self, playback: Playback<'_>) -> HostResult<Outcome> {
        match self.decide(playback.single) {
            Action::Forward => {
                tracing::debug!("Socket exists and single instance mode is enabled.");
                match self.forward(playback.url) {
                    Ok(()) => Ok(Outcome::Forwarded),
                    Err(e) => {
                        tracing::error!("{e}");
                        self.remove_stale_socket();
                        self.spawn(playback)?;
                        Ok(Outcome::Respawned)
                    }
                }
            }
            Action::Spawn => {
                self.spawn(playback)?;
                Ok(Outcome::Spawned)
            }
        }
    }

    fn forward(&self, url: &str) -> HostResult<()> {
        tracing::debug!("Sending loadfile command.");
        let transport_err = |source| HostError::Transport {
            path: self.socket().to_path_buf(),
            source,
        };
        let mut conn = self
            .transport
            .connect(self.socket(), self.timeout)
            .map_err(transport_err)?;
        tracing::debug!("Connected to socket.");
        self.transport
            .send(&mut conn, &loadfile_command(url))
            .map_err(transport_err)
    }

    fn remove_stale_socket(&self) {
        if let Err(source) = self.transport.remove(self.socket()) {
            let err = HostError::Cleanup {
                path: self.socket().to_path_buf(),
                source,
            };
            tracing::warn!("{err}");
        }
    }

    fn spawn(&mut self, playback: Playback<'_>) -> HostResult<()> {
        tracing::debug!("Spawning initial instance.");
        let command = PlayerCommand::new(
            playback.url,
            playback.debug,
            self.paths,
            self.settings,
            playback.env,
        );
        self.launcher.launch(command)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_validation_is_anchored() {
        assert_eq!(validate_url(Some("https://a.b/c")), Ok("https://a.b/c"));
        assert_eq!(validate_url(Some("http://a.b")), Ok("http://a.b"));
        assert_eq!(validate_url(None), Err(ValidationError::MissingUrl));
        for bad in ["bad", "ftp://x", "file:///etc/passwd", "xhttps://a", " https://a", "HTTPS://a"] {
            assert!(
                matches!(validate_url(Some(bad)), Err(ValidationError::UnsupportedScheme(_))),
                "{bad} should be rejected"
            );
        }
    }
}
