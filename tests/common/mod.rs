#![allow(dead_code)]

use open_in_mpv::config::{HostPaths, Settings};
use open_in_mpv::detach::Launcher;
use open_in_mpv::dispatch::HostContext;
use open_in_mpv::player::PlayerCommand;
use open_in_mpv::transport::IpcTransport;
use open_in_mpv::DetachError;
use std::cell::RefCell;
use std::rc::Rc;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, io};
use std::io::Write;
use tempfile::TempDir;

/// Env guard that restores previous env vars on drop.
pub struct EnvGuard {
    old: HashMap<String, Option<String>>,
}

impl EnvGuard {
    pub fn set(vars: &[(&str, String)]) -> Self {
        let mut old = HashMap::new();
        for (k, v) in vars {
            old.entry((*k).to_string()).or_insert_with(|| env::var(k).ok());
            env::set_var(k, v);
        }
        Self { old }
    }

    pub fn unset(&mut self, key: &str) {
        self.old
            .entry(key.to_string())
            .or_insert_with(|| env::var(key).ok());
        env::remove_var(key);
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (k, prev) in self.old.drain() {
            match prev {
                Some(v) => env::set_var(k, v),
                None => env::remove_var(k),
            }
        }
    }
}

/// Create a temp sandbox and point every base directory the installer
/// expands into it.
pub fn sandbox_env() -> (TempDir, EnvGuard) {
    let td = TempDir::new().expect("tempdir");
    let root = td.path().to_path_buf();

    let home = root.join("home");
    let config = home.join(".config");
    let appdata = root.join("appdata_roaming");
    let localappdata = root.join("appdata_local");

    for dir in [&home, &config, &appdata, &localappdata] {
        std::fs::create_dir_all(dir).unwrap();
    }

    let guard = EnvGuard::set(&[
        ("HOME", home.to_string_lossy().to_string()),
        ("XDG_CONFIG_HOME", config.to_string_lossy().to_string()),
        ("APPDATA", appdata.to_string_lossy().to_string()),
        ("LOCALAPPDATA", localappdata.to_string_lossy().to_string()),
    ]);

    (td, guard)
}

/// A host context rooted in `dir`, with a fixed environment.
pub fn context(dir: &Path) -> HostContext {
    HostContext {
        paths: HostPaths::in_dir(dir),
        settings: Settings::default(),
        base_env: BTreeMap::from([
            ("PATH".to_string(), "/usr/bin".to_string()),
            ("HOME".to_string(), "/home/u".to_string()),
        ]),
        alternate_bin: dir.join("no-such-bin"),
    }
}

/// Frame `json` as the browser would.
pub fn frame(json: &str) -> Vec<u8> {
    let mut out = (json.len() as i32).to_ne_bytes().to_vec();
    out.extend_from_slice(json.as_bytes());
    out
}

/// Side effects in the order they happened, shared between the mocks.
pub type EventLog = Rc<RefCell<Vec<&'static str>>>;

/// Output sink that logs `ack` each time a frame is flushed.
#[derive(Default)]
pub struct RecordingWriter {
    pub bytes: Vec<u8>,
    pub events: EventLog,
}

impl Write for RecordingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.events.borrow_mut().push("ack");
        Ok(())
    }
}

/// Records every transport call; `present` and `refuse` script its behaviour.
#[derive(Default)]
pub struct MockTransport {
    pub present: bool,
    pub refuse: bool,
    pub events: EventLog,
    pub exists_calls: RefCell<Vec<PathBuf>>,
    pub connects: RefCell<Vec<PathBuf>>,
    pub sent: RefCell<Vec<Vec<u8>>>,
    pub removed: RefCell<Vec<PathBuf>>,
}

impl MockTransport {
    pub fn with_socket() -> Self {
        Self {
            present: true,
            ..Self::default()
        }
    }

    pub fn stale() -> Self {
        Self {
            present: true,
            refuse: true,
            ..Self::default()
        }
    }

    pub fn untouched(&self) -> bool {
        self.exists_calls.borrow().is_empty()
            && self.connects.borrow().is_empty()
            && self.sent.borrow().is_empty()
            && self.removed.borrow().is_empty()
    }
}

impl IpcTransport for MockTransport {
    type Connection = Vec<u8>;

    fn exists(&self, path: &Path) -> bool {
        self.events.borrow_mut().push("exists");
        self.exists_calls.borrow_mut().push(path.to_path_buf());
        self.present
    }

    fn connect(&self, path: &Path, _timeout: Duration) -> io::Result<Vec<u8>> {
        self.events.borrow_mut().push("connect");
        self.connects.borrow_mut().push(path.to_path_buf());
        if self.refuse {
            Err(io::Error::from(io::ErrorKind::ConnectionRefused))
        } else {
            Ok(Vec::new())
        }
    }

    fn send(&self, _conn: &mut Vec<u8>, bytes: &[u8]) -> io::Result<()> {
        self.events.borrow_mut().push("send");
        self.sent.borrow_mut().push(bytes.to_vec());
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.events.borrow_mut().push("remove");
        self.removed.borrow_mut().push(path.to_path_buf());
        Ok(())
    }
}

/// Collects launches instead of forking.
#[derive(Default)]
pub struct MockLauncher {
    pub launched: Vec<PlayerCommand>,
    pub events: EventLog,
}

impl Launcher for MockLauncher {
    fn launch(&mut self, command: PlayerCommand) -> Result<(), DetachError> {
        self.events.borrow_mut().push("launch");
        self.launched.push(command);
        Ok(())
    }
}
