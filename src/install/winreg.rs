use super::Scope;
use std::io;
use std::path::{Path, PathBuf};
use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE};
use winreg::RegKey;

fn root(scope: Scope) -> RegKey {
    match scope {
        Scope::User => RegKey::predef(HKEY_CURRENT_USER),
        Scope::System => RegKey::predef(HKEY_LOCAL_MACHINE),
    }
}

/// Point the browser's `NativeMessagingHosts\<host>` key at `manifest`.
pub fn write_manifest_reg(scope: Scope, key_path: &str, manifest: &Path) -> io::Result<()> {
    let (key, _) = root(scope).create_subkey(key_path)?;
    key.set_value("", &manifest.to_string_lossy().as_ref())?;
    Ok(())
}

/// Delete the key. A missing key is not an error.
pub fn remove_manifest_reg(scope: Scope, key_path: &str) -> io::Result<()> {
    match root(scope).delete_subkey(key_path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// The manifest path the key points at, if the key exists.
pub fn read_manifest_path_from_reg(scope: Scope, key_path: &str) -> io::Result<Option<PathBuf>> {
    let key = match root(scope).open_subkey(key_path) {
        Ok(k) => k,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let value: String = key.get_value("")?;
    Ok(Some(PathBuf::from(value)))
}
