//! Client side of the coordination socket.
//!
//! The running player owns the endpoint; the host only checks for it, connects,
//! writes one command, and deletes it when it turns out to be stale. Each
//! platform gets one [`IpcTransport`] implementation, chosen at compile time by
//! [`platform_transport`].

use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

/// Bound on connecting to (and writing to) a running player.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Capability interface over the coordination endpoint.
pub trait IpcTransport {
    type Connection: Write;

    /// Whether something is present at `path`. A stale file counts.
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn connect(&self, path: &Path, timeout: Duration) -> io::Result<Self::Connection>;

    fn send(&self, conn: &mut Self::Connection, bytes: &[u8]) -> io::Result<()> {
        conn.write_all(bytes)?;
        conn.flush()
    }

    /// Remove a stale endpoint. Absence is not an error.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

#[derive(Serialize)]
struct IpcCommand<'a> {
    command: [&'a str; 2],
}

/// The newline-terminated `loadfile` command understood by mpv's JSON IPC.
pub fn loadfile_command(url: &str) -> Vec<u8> {
    let cmd = IpcCommand {
        command: ["loadfile", url],
    };
    // Serializing two strings cannot fail.
    let mut bytes = serde_json::to_vec(&cmd).unwrap_or_default();
    bytes.push(b'\n');
    bytes
}

#[cfg(unix)]
pub use unix::UnixSocketTransport as PlatformTransport;
#[cfg(windows)]
pub use windows::NamedPipeTransport as PlatformTransport;

/// The transport for the platform we were built for.
pub fn platform_transport() -> PlatformTransport {
    PlatformTransport::default()
}

#[cfg(unix)]
mod unix {
    use super::IpcTransport;
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
    use std::os::unix::net::UnixStream;
    use std::path::Path;
    use std::time::{Duration, Instant};

    /// Backoff while a listener's accept queue is full.
    const BUSY_RETRY: Duration = Duration::from_millis(20);

    /// Unix domain stream socket.
    ///
    /// The connect itself is bounded: a player that is alive but no longer
    /// accepting can leave a blocking `connect` stuck in the kernel. The same
    /// bound then applies to reads and writes on the established stream.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct UnixSocketTransport;

    impl IpcTransport for UnixSocketTransport {
        type Connection = UnixStream;

        fn connect(&self, path: &Path, timeout: Duration) -> io::Result<UnixStream> {
            let stream = connect_bounded(path, timeout)?;
            stream.set_write_timeout(Some(timeout))?;
            stream.set_read_timeout(Some(timeout))?;
            Ok(stream)
        }

        fn remove(&self, path: &Path) -> io::Result<()> {
            match std::fs::remove_file(path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            }
        }
    }

    fn socket_addr(path: &Path) -> io::Result<(libc::sockaddr_un, libc::socklen_t)> {
        // SAFETY: sockaddr_un is plain old data; all-zero is a valid value.
        let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
        let bytes = path.as_os_str().as_bytes();
        if bytes.len() >= addr.sun_path.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "socket path is too long",
            ));
        }
        addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
        for (dst, src) in addr.sun_path.iter_mut().zip(bytes) {
            *dst = *src as libc::c_char;
        }
        let len = std::mem::size_of::<libc::sockaddr_un>() as libc::socklen_t;
        Ok((addr, len))
    }

    fn timed_out() -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, "connect timed out")
    }

    /// Non-blocking `connect` retried until `timeout`, then switched back to
    /// blocking mode.
    fn connect_bounded(path: &Path, timeout: Duration) -> io::Result<UnixStream> {
        let (addr, len) = socket_addr(path)?;
        // SAFETY: plain socket(2) call; the result is checked below.
        let fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `fd` is a freshly created socket nobody else owns.
        let stream = unsafe { UnixStream::from_raw_fd(fd) };
        stream.set_nonblocking(true)?;

        let deadline = Instant::now() + timeout;
        loop {
            // SAFETY: `addr` outlives the call and `len` is its size.
            let rc = unsafe {
                libc::connect(
                    stream.as_raw_fd(),
                    &addr as *const libc::sockaddr_un as *const libc::sockaddr,
                    len,
                )
            };
            if rc == 0 {
                break;
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::EISCONN) => break,
                Some(libc::EINPROGRESS) => {
                    wait_connected(stream.as_raw_fd(), deadline)?;
                    break;
                }
                // Linux reports a full accept queue as EAGAIN.
                Some(libc::EAGAIN) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(timed_out());
                    }
                    std::thread::sleep(BUSY_RETRY.min(deadline - now));
                }
                _ => return Err(err),
            }
        }
        stream.set_nonblocking(false)?;
        Ok(stream)
    }

    fn wait_connected(fd: RawFd, deadline: Instant) -> io::Result<()> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out());
            }
            let mut pfd = libc::pollfd {
                fd,
                events: libc::POLLOUT,
                revents: 0,
            };
            let ms = remaining.as_millis().clamp(1, i32::MAX as u128) as libc::c_int;
            // SAFETY: `pfd` is a valid pollfd array of length 1.
            match unsafe { libc::poll(&mut pfd, 1, ms) } {
                0 => return Err(timed_out()),
                n if n < 0 => {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::Interrupted {
                        return Err(err);
                    }
                }
                _ => break,
            }
        }
        let mut so_error: libc::c_int = 0;
        let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
        // SAFETY: out-pointers are valid for the sizes passed.
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_ERROR,
                &mut so_error as *mut libc::c_int as *mut libc::c_void,
                &mut len,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        if so_error != 0 {
            return Err(io::Error::from_raw_os_error(so_error));
        }
        Ok(())
    }
}

#[cfg(windows)]
mod windows {
    use super::IpcTransport;
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::path::Path;
    use std::time::{Duration, Instant};

    const ERROR_PIPE_BUSY: i32 = 231;

    /// Named pipe client. Pipes disappear with their server, so there is
    /// nothing to clean up.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct NamedPipeTransport;

    impl IpcTransport for NamedPipeTransport {
        type Connection = File;

        fn connect(&self, path: &Path, timeout: Duration) -> io::Result<File> {
            let deadline = Instant::now() + timeout;
            loop {
                match OpenOptions::new().read(true).write(true).open(path) {
                    Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) && Instant::now() < deadline => {
                        tracing::debug!("Pipe busy, retrying.");
                        std::thread::sleep(Duration::from_millis(100));
                    }
                    other => return other,
                }
            }
        }

        fn remove(&self, _path: &Path) -> io::Result<()> {
            Ok(())
        }
    }
}
