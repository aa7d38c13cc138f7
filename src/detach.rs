//! Starting the player so that it outlives the host.
//!
//! The browser kills the native host's process tree when it is done with it,
//! so the player must not be our child. On Unix that is the classic double
//! fork (Stevens, *Advanced Programming in the UNIX Environment*); on Windows
//! the player is created as a detached process in its own process group.

use crate::error::DetachError;
use crate::player::PlayerCommand;

/// Something that can start a player launch in the background.
///
/// The coordinator only talks to this trait, which keeps forking out of tests.
pub trait Launcher {
    fn launch(&mut self, command: PlayerCommand) -> Result<(), DetachError>;
}

/// The real launcher: detaches, runs the player, and cleans up its socket
/// when the player exits.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedLauncher;

#[cfg(unix)]
impl Launcher for DetachedLauncher {
    fn launch(&mut self, command: PlayerCommand) -> Result<(), DetachError> {
        tracing::debug!("Running: {}", command.display());
        detach_and_run(move || run_player(&command))
    }
}

#[cfg(windows)]
impl Launcher for DetachedLauncher {
    fn launch(&mut self, command: PlayerCommand) -> Result<(), DetachError> {
        use std::os::windows::process::CommandExt;
        use std::process::Stdio;

        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

        tracing::debug!("Running: {}", command.display());
        let log = open_log(&command)?;
        let err_log = log.try_clone().map_err(|source| DetachError::Log {
            path: command.log_path.clone(),
            source,
        })?;
        command
            .to_command()
            .creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(err_log)
            .spawn()
            .map(drop)
            .map_err(|source| DetachError::Spawn {
                program: command.program.display().to_string(),
                source,
            })
    }
}

fn open_log(command: &PlayerCommand) -> Result<std::fs::File, DetachError> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&command.log_path)
        .map_err(|source| DetachError::Log {
            path: command.log_path.clone(),
            source,
        })
}

/// Run `callback` in a grandchild that belongs to a new session.
///
/// Returns in the calling process once the intermediate child has been
/// reaped. The grandchild never returns from this function: it exits with the
/// callback's status via `_exit`, skipping destructors and atexit handlers it
/// inherited from the host.
///
/// Only a failure of the first fork is reported to the caller. A failure of
/// the second fork is logged by the intermediate child, which then exits 1.
///
/// The caller must be single-threaded.
#[cfg(unix)]
pub fn detach_and_run<F>(callback: F) -> Result<(), DetachError>
where
    F: FnOnce() -> i32,
{
    use crate::error::ForkStage;
    use std::io;

    // SAFETY: the host never starts threads, so the child is a faithful copy.
    match unsafe { libc::fork() } {
        -1 => {
            return Err(DetachError::Fork {
                stage: ForkStage::First,
                source: io::Error::last_os_error(),
            })
        }
        0 => {}
        child => {
            reap(child);
            return Ok(());
        }
    }

    // First child: leave the host's session, then fork again so the
    // grandchild can never reacquire a controlling terminal.
    // SAFETY: setsid has no memory-safety preconditions.
    unsafe { libc::setsid() };
    tracing::debug!("Second fork.");
    // SAFETY: as above, single-threaded.
    match unsafe { libc::fork() } {
        -1 => {
            let err = DetachError::Fork {
                stage: ForkStage::Second,
                source: io::Error::last_os_error(),
            };
            tracing::error!("{err}");
            // SAFETY: terminating the intermediate child without unwinding.
            unsafe { libc::_exit(1) }
        }
        0 => {}
        // SAFETY: the intermediate child has nothing left to do.
        _ => unsafe { libc::_exit(0) },
    }

    tracing::debug!("Calling callback.");
    let status = callback();
    tracing::debug!("Callback returned.");
    // SAFETY: the grandchild must not run the host's cleanup.
    unsafe { libc::_exit(status) }
}

#[cfg(unix)]
fn reap(pid: libc::pid_t) {
    let mut status = 0;
    loop {
        // SAFETY: `status` is a valid out-pointer for the duration of the call.
        let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
        if rc != -1 || std::io::Error::last_os_error().kind() != std::io::ErrorKind::Interrupted {
            break;
        }
    }
}

/// Body of the detached grandchild: point stdio at the player log, run the
/// player to completion, then remove the socket it was serving.
#[cfg(unix)]
fn run_player(command: &PlayerCommand) -> i32 {
    use std::process::Stdio;

    let log = match open_log(command) {
        Ok(log) => log,
        Err(e) => {
            tracing::error!("{e}");
            return 1;
        }
    };
    redirect_stdio(&log);

    let mut cmd = command.to_command();
    cmd.stdin(Stdio::null());
    if let Ok(out) = log.try_clone() {
        cmd.stdout(out);
    }
    cmd.stderr(log);

    let code = match cmd.status() {
        Ok(status) if status.success() => 0,
        Ok(status) => {
            tracing::error!("{} exited with {status}.", command.program.display());
            status.code().unwrap_or(1)
        }
        Err(e) => {
            tracing::error!("Failed to run {}: {e}", command.program.display());
            1
        }
    };

    if let Err(e) = std::fs::remove_file(&command.socket_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove socket file: {e}");
        }
    }
    code
}

/// Stop holding the browser's pipes: stdin from /dev/null, stdout and stderr
/// into the log.
#[cfg(unix)]
fn redirect_stdio(log: &std::fs::File) {
    use std::os::unix::io::AsRawFd;

    let fd = log.as_raw_fd();
    // SAFETY: dup2/open/close on descriptors we own; failures leave the old fd.
    unsafe {
        let null = libc::open(c"/dev/null".as_ptr(), libc::O_RDONLY);
        if null >= 0 {
            libc::dup2(null, libc::STDIN_FILENO);
            libc::close(null);
        }
        libc::dup2(fd, libc::STDOUT_FILENO);
        libc::dup2(fd, libc::STDERR_FILENO);
    }
}
