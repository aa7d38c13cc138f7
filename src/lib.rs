//! # open_in_mpv
//!
//! The native messaging host behind the *open-in-mpv* browser extension.
//!
//! The browser starts `open-in-mpv` once per request and writes a single framed
//! JSON message to its stdin. The host either answers an `init` handshake, or
//! acknowledges a URL and makes sure it ends up playing in mpv:
//!
//! - if single-instance mode is on and an mpv is already listening on the
//!   coordination socket, the URL is sent to it with `loadfile`;
//! - otherwise a new mpv is started, fully detached from the browser, with its
//!   IPC server bound to that socket so later requests can reuse it.
//!
//! ---
//!
//! ## Wire protocol
//!
//! 1. The sender writes a **4-byte length prefix** in **native endianness**.
//! 2. Then **that many bytes** of UTF-8 JSON.
//!
//! Inbound frames are capped at 64 MiB ([`host::MAX_FROM_BROWSER`]), outbound at
//! 1 MiB ([`host::MAX_TO_BROWSER`]).
//!
//! Requests look like:
//!
//! ```json
//! {"init": true}
//! {"url": "https://example.com/watch?v=1", "debug": false, "single": true}
//! ```
//!
//! **Stdout carries protocol frames only.** All diagnostics go through
//! [`tracing`] into `main.log` (see [`logging`]), and to stderr in debug mode.
//!
//! ---
//!
//! ## Crate layout
//!
//! - [`host`]: framing, request and response types.
//! - [`dispatch`]: one request in, at most one response out.
//! - [`coordinator`]: forward to a running player or start a new one.
//! - [`transport`]: the coordination socket (Unix socket or named pipe).
//! - [`detach`]: starting the player so it outlives the host.
//! - [`player`]: the mpv command line.
//! - [`env`]: the environment handed to mpv.
//! - [`config`]: log/socket locations and the optional settings file.
//! - [`install`]: manifest installer used by `open-in-mpv-install` and
//!   `open-in-mpv-uninstall` (feature `install`).
//!
//! ## Serving a request in-process
//!
//! ```no_run
//! use open_in_mpv::config::{HostPaths, Settings};
//! use open_in_mpv::detach::DetachedLauncher;
//! use open_in_mpv::dispatch::{serve_one, HostContext};
//! use open_in_mpv::transport::platform_transport;
//!
//! let ctx = HostContext::from_process(HostPaths::resolve(), Settings::load());
//! let outcome = serve_one(
//!     &mut std::io::stdin().lock(),
//!     &mut std::io::stdout(),
//!     &ctx,
//!     &platform_transport(),
//!     &mut DetachedLauncher,
//! )
//! .unwrap();
//! eprintln!("{outcome:?}");
//! ```
//!
//! ## Pure framing
//!
//! ```rust
//! use open_in_mpv::host::{decode_request, encode_message};
//! use serde_json::json;
//! use std::io::Cursor;
//!
//! let frame = encode_message(&json!({"url": "https://example.com", "single": false})).unwrap();
//! let req = decode_request(&mut Cursor::new(frame)).unwrap();
//! assert_eq!(req.url.as_deref(), Some("https://example.com"));
//! assert!(!req.single);
//! ```

pub mod config;
pub mod coordinator;
pub mod detach;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod host;
#[cfg(feature = "install")]
pub mod install;
pub mod logging;
pub mod player;
pub mod transport;

#[doc(inline)]
pub use coordinator::{Action, Outcome};
#[doc(inline)]
pub use dispatch::{dispatch, serve_one, HostContext};
#[doc(inline)]
pub use error::{DetachError, FramingError, HostError, HostResult, ValidationError};
#[doc(inline)]
pub use host::{decode_request, encode_message, Request, Response};
