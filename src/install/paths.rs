use super::InstallError;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Per-user or machine-wide installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    User,
    System,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::User => f.write_str("user"),
            Scope::System => f.write_str("system"),
        }
    }
}

/// Which manifest flavour a browser reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Reads `allowed_origins`.
    Chromium,
    /// Reads `allowed_extensions`.
    Firefox,
}

/// Directory templates for one scope, per OS.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OsDirs {
    pub linux: Option<String>,
    pub macos: Option<String>,
    pub windows: Option<String>,
}

impl OsDirs {
    fn current(&self) -> Option<&str> {
        #[cfg(target_os = "macos")]
        let dir = self.macos.as_deref();
        #[cfg(windows)]
        let dir = self.windows.as_deref();
        #[cfg(not(any(target_os = "macos", windows)))]
        let dir = self.linux.as_deref();
        dir
    }
}

/// One entry of `browsers.toml`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrowserInfo {
    pub family: Family,
    pub registry: Option<String>,
    #[serde(default)]
    pub user: OsDirs,
    #[serde(default)]
    pub system: OsDirs,
}

impl BrowserInfo {
    fn dirs(&self, scope: Scope) -> &OsDirs {
        match scope {
            Scope::User => &self.user,
            Scope::System => &self.system,
        }
    }
}

pub type BrowserTable = BTreeMap<String, BrowserInfo>;

static BROWSERS: Lazy<Result<BrowserTable, String>> =
    Lazy::new(|| toml::from_str(include_str!("browsers.toml")).map_err(|e| e.to_string()));

/// The embedded browser table.
pub fn browsers() -> Result<&'static BrowserTable, InstallError> {
    match &*BROWSERS {
        Ok(table) => Ok(table),
        Err(e) => Err(InstallError::Config(e.clone())),
    }
}

/// All browser keys, sorted.
pub fn browser_keys() -> Result<Vec<&'static str>, InstallError> {
    Ok(browsers()?.keys().map(String::as_str).collect())
}

pub fn browser_info(browser: &str) -> Result<&'static BrowserInfo, InstallError> {
    browsers()?
        .get(browser)
        .ok_or_else(|| InstallError::UnknownBrowser(browser.to_string()))
}

/// Directory the browser reads manifests from, for this OS and scope.
pub fn manifest_dir(browser: &str, scope: Scope) -> Result<PathBuf, InstallError> {
    let template = browser_info(browser)?
        .dirs(scope)
        .current()
        .ok_or_else(|| InstallError::NotConfigured {
            browser: browser.to_string(),
            scope,
        })?;
    expand(template)
}

/// Full manifest path for `host_name`.
pub fn manifest_path(browser: &str, scope: Scope, host_name: &str) -> Result<PathBuf, InstallError> {
    Ok(manifest_dir(browser, scope)?.join(format!("{host_name}.json")))
}

/// Registry key for `host_name`, for browsers that use one.
pub fn winreg_key_path(browser: &str, host_name: &str) -> Result<Option<String>, InstallError> {
    Ok(browser_info(browser)?
        .registry
        .as_ref()
        .map(|base| format!(r"{base}\{host_name}")))
}

fn expand(template: &str) -> Result<PathBuf, InstallError> {
    let mut out = template.to_string();
    if out.contains("{home}") {
        let home = dirs::home_dir().ok_or(InstallError::NoHomeDir)?;
        out = out.replace("{home}", &home.to_string_lossy());
    }
    if out.contains("{config}") {
        let config = dirs::config_dir().ok_or(InstallError::NoHomeDir)?;
        out = out.replace("{config}", &config.to_string_lossy());
    }
    if out.contains("{localappdata}") {
        let local = std::env::var_os("LOCALAPPDATA")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::data_local_dir)
            .ok_or(InstallError::NoHomeDir)?;
        out = out.replace("{localappdata}", &local.to_string_lossy());
    }
    Ok(PathBuf::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_table_parses() {
        let keys = browser_keys().unwrap();
        for k in ["brave", "chrome", "chrome-beta", "chrome-canary", "chromium", "edge", "firefox"] {
            assert!(keys.contains(&k), "missing {k}");
        }
        assert_eq!(browser_info("firefox").unwrap().family, Family::Firefox);
        assert_eq!(browser_info("edge").unwrap().family, Family::Chromium);
    }

    #[test]
    fn unknown_browser_is_an_error() {
        assert!(matches!(
            manifest_dir("netscape", Scope::User),
            Err(InstallError::UnknownBrowser(_))
        ));
    }

    #[test]
    fn registry_key_includes_host() {
        let key = winreg_key_path("chrome", "sh.tat.open_in_mpv").unwrap().unwrap();
        assert_eq!(key, r"Software\Google\Chrome\NativeMessagingHosts\sh.tat.open_in_mpv");
        assert_eq!(winreg_key_path("brave", "x").unwrap(), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_system_dirs_are_absolute() {
        assert_eq!(
            manifest_dir("chrome", Scope::System).unwrap(),
            PathBuf::from("/etc/opt/chrome/native-messaging-hosts")
        );
        assert!(matches!(
            manifest_dir("brave", Scope::System),
            Err(InstallError::NotConfigured { .. })
        ));
    }
}
