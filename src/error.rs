//! Error types for the host.
//!
//! The browser never sees these distinctions: it either receives the framed
//! acknowledgement or the host exits non-zero without writing anything. The
//! variants exist so the binary can decide what is fatal and what is logged.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Top-level error for one host invocation.
#[derive(Debug, Error)]
pub enum HostError {
    /// The request frame could not be read or parsed.
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// The request was well-formed but asked for something we refuse to do.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Talking to a running player over the coordination socket failed.
    ///
    /// The coordinator recovers from this by spawning a new player, so it only
    /// escapes when a transport is used directly.
    #[error("coordination socket {path}: {source}")]
    Transport { path: PathBuf, source: io::Error },

    /// The player could not be detached from this process.
    #[error(transparent)]
    Detach(#[from] DetachError),

    /// A stale coordination socket could not be removed.
    #[error("failed to remove stale socket {path}: {source}")]
    Cleanup { path: PathBuf, source: io::Error },

    /// Writing the response to stdout failed.
    #[error("failed to write response: {0}")]
    Io(#[from] io::Error),
}

/// Errors reading or writing a native-messaging frame.
#[derive(Debug, Error)]
pub enum FramingError {
    /// Fewer bytes than the frame promised (including a missing length prefix).
    #[error("malformed framing: {0}")]
    Truncated(#[source] io::Error),

    /// The length prefix is negative.
    #[error("malformed framing: negative length prefix {0}")]
    NegativeLength(i32),

    /// The frame is larger than the direction allows.
    #[error("malformed framing: message of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    /// The payload is not UTF-8 JSON.
    #[error("malformed payload: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The payload is JSON, but not an object.
    #[error("malformed payload: expected a JSON object")]
    NotAnObject,
}

impl FramingError {
    /// True for errors in the length prefix / byte stream rather than the JSON.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::Truncated(_) | Self::NegativeLength(_) | Self::TooLarge { .. }
        )
    }

    /// True for errors in the JSON payload itself.
    pub fn is_payload(&self) -> bool {
        !self.is_framing()
    }
}

/// Request validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no URL was given")]
    MissingUrl,

    #[error("invalid URL: {0}")]
    UnsupportedScheme(String),
}

/// Which fork of the double-fork failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkStage {
    First,
    Second,
}

impl std::fmt::Display for ForkStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::First => f.write_str("#1"),
            Self::Second => f.write_str("#2"),
        }
    }
}

/// Failure to detach the player from the host process.
#[derive(Debug, Error)]
pub enum DetachError {
    #[error("fork {stage} failed: {} ({source})", .source.raw_os_error().unwrap_or(0))]
    Fork { stage: ForkStage, source: io::Error },

    #[error("failed to spawn detached player {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("failed to open player log {path}: {source}")]
    Log { path: PathBuf, source: io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_error_mentions_errno_and_stage() {
        let err = DetachError::Fork {
            stage: ForkStage::First,
            source: io::Error::from_raw_os_error(11),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("fork #1 failed: 11 ("), "{msg}");
    }

    #[test]
    fn framing_and_payload_are_distinguished() {
        let truncated = FramingError::Truncated(io::ErrorKind::UnexpectedEof.into());
        assert!(truncated.is_framing());
        assert!(FramingError::NotAnObject.is_payload());
        assert!(FramingError::NegativeLength(-1).is_framing());
    }
}
