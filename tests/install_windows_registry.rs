#![cfg(all(windows, feature = "windows-registry"))]

mod common;

use open_in_mpv::install::manifest::CHROMIUM_HOST_NAME;
use open_in_mpv::install::{install, paths, remove, verify_installed, winreg, Scope};
use serial_test::serial;
use std::path::PathBuf;

#[test]
#[serial]
fn registry_points_at_the_manifest() {
    let (_td, _env) = common::sandbox_env();
    let exe = PathBuf::from(r"C:\Windows\System32\cmd.exe");
    let browsers = &["chrome", "edge", "firefox"];

    install(&exe, browsers, Scope::User, true).unwrap();
    assert!(verify_installed(Some(browsers), Scope::User).unwrap());

    let key = paths::winreg_key_path("chrome", CHROMIUM_HOST_NAME)
        .unwrap()
        .unwrap();
    let p = winreg::read_manifest_path_from_reg(Scope::User, &key)
        .unwrap()
        .expect("registry key should exist");
    assert!(p.exists(), "registry should point to existing manifest: {p:?}");

    remove(browsers, Scope::User).unwrap();
    assert!(!verify_installed(Some(browsers), Scope::User).unwrap());
    assert_eq!(winreg::read_manifest_path_from_reg(Scope::User, &key).unwrap(), None);
}
