//! Kept in its own test binary so no other test threads exist at fork time.
#![cfg(unix)]

use open_in_mpv::detach::detach_and_run;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::time::{Duration, Instant};

#[test]
fn grandchild_runs_callback_and_parent_returns() {
    let td = tempfile::tempdir().unwrap();
    let marker = td.path().join("ran");
    let staging = CString::new(td.path().join("ran.tmp").as_os_str().as_bytes()).unwrap();
    let marker_c = CString::new(marker.as_os_str().as_bytes()).unwrap();
    let (staging, marker_c) = (staging.as_c_str(), marker_c.as_c_str());

    // Only raw syscalls in the grandchild: no allocation, no locks.
    detach_and_run(|| unsafe {
        let ppid = libc::getppid();
        // Not a session leader: the session belongs to the intermediate child.
        let not_leader = i32::from(libc::getsid(0) != libc::getpid());
        let mut body = [0u8; 8];
        body[..4].copy_from_slice(&ppid.to_ne_bytes());
        body[4..].copy_from_slice(&not_leader.to_ne_bytes());

        let fd = libc::open(
            staging.as_ptr(),
            libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
            0o644 as libc::c_uint,
        );
        if fd < 0 {
            return 1;
        }
        let n = libc::write(fd, body.as_ptr().cast(), body.len());
        libc::close(fd);
        if n != body.len() as isize || libc::rename(staging.as_ptr(), marker_c.as_ptr()) != 0 {
            return 1;
        }
        0
    })
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !marker.exists() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    let body = std::fs::read(&marker).unwrap();
    assert_eq!(body.len(), 8);
    let ppid = i32::from_ne_bytes(body[..4].try_into().unwrap());
    let not_leader = i32::from_ne_bytes(body[4..].try_into().unwrap());
    assert_ne!(ppid as u32, std::process::id());
    assert_eq!(not_leader, 1);
}
