use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_TIMEZONE: &str = "Asia/Tokyo";
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_WORKERS: usize = 1;

/// Contents of `config.toml`; every field may be overridden on the command line
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timezone: Option<String>,
    pub workers: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub page_size: Option<usize>,
}

/// Fully resolved client settings
#[derive(Clone)]
pub struct ClientSettings {
    pub server_url: String,
    pub username: String,
    pub password: String,
    pub timezone: String,
    pub workers: usize,
    pub timeout: Option<Duration>,
    pub page_size: usize,
}

impl ClientSettings {
    pub fn new(
        server_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            username: username.into(),
            password: password.into(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            workers: DEFAULT_WORKERS,
            timeout: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("timezone", &self.timezone)
            .field("workers", &self.workers)
            .field("timeout", &self.timeout)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl Config {
    /// Resolve into settings; server url, username and password are required
    pub fn into_settings(self) -> Result<ClientSettings> {
        let server_url = required(self.server_url, "server_url")?;
        let username = required(self.username, "username")?;
        let password = required(self.password, "password")?;

        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(Error::Config("page_size must be positive".into()));
        }

        let mut settings = ClientSettings::new(server_url, username, password)
            .with_workers(self.workers.unwrap_or(DEFAULT_WORKERS))
            .with_page_size(page_size);
        if let Some(timezone) = self.timezone.filter(|tz| !tz.trim().is_empty()) {
            settings = settings.with_timezone(timezone);
        }
        if let Some(secs) = self.timeout_secs {
            settings = settings.with_timeout(Duration::from_secs(secs));
        }
        Ok(settings)
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Config(format!("{field} is not set")))
}

/// Load the config file; a missing file yields the defaults
pub fn load() -> Result<Config> {
    match config_path() {
        Some(path) => load_from(&path),
        None => Ok(Config::default()),
    }
}

pub fn load_from(path: &Path) -> Result<Config> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Config::default()),
        Err(err) => return Err(Error::Config(format!("read {}: {err}", path.display()))),
    };
    toml::from_str::<Config>(&content)
        .map_err(|err| Error::Config(format!("parse {}: {err}", path.display())))
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("OPENEMS_CONFIG").map(PathBuf::from) {
        return Some(path);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(xdg.join("openems").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".config").join("openems").join("config.toml"));
    }

    directories::ProjectDirs::from("io", "openems", "openems")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            server_url = "wss://portal.example.com/openems-backend-ui2"
            username = "admin"
            password = "secret"
            timezone = "Europe/Berlin"
            workers = 2
            timeout_secs = 30
            "#,
        )
        .unwrap();

        let settings = config.into_settings().unwrap();
        assert_eq!(settings.server_url, "wss://portal.example.com/openems-backend-ui2");
        assert_eq!(settings.timezone, "Europe/Berlin");
        assert_eq!(settings.workers, 2);
        assert_eq!(settings.timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_defaults_apply() {
        let config = Config {
            server_url: Some("ws://localhost:8082".into()),
            username: Some("user".into()),
            password: Some("user".into()),
            ..Config::default()
        };
        let settings = config.into_settings().unwrap();
        assert_eq!(settings.timezone, DEFAULT_TIMEZONE);
        assert_eq!(settings.workers, DEFAULT_WORKERS);
        assert_eq!(settings.timeout, None);
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let config = Config {
            server_url: Some("ws://localhost:8082".into()),
            ..Config::default()
        };
        let err = config.into_settings().unwrap_err();
        assert_eq!(err.to_string(), "configuration error: username is not set");
    }

    #[test]
    fn test_debug_hides_password() {
        let settings = ClientSettings::new("ws://x", "u", "hunter2");
        assert!(!format!("{settings:?}").contains("hunter2"));
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = std::env::temp_dir().join("openems-config-does-not-exist.toml");
        let config = load_from(&path).unwrap();
        assert!(config.server_url.is_none());
    }
}
