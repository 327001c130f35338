//! Configuration and credential storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::{Session, TokenStore};

const DEFAULT_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_SOCKET_URL: &str = "http://localhost:5000";
const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_TYPING_TIMEOUT_SECS: u64 = 3;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// REST base URL (ticket endpoints live under `/tickets`)
    pub api_url: String,
    /// Realtime channel base URL
    pub socket_url: String,
    /// History page size
    pub page_size: u32,
    /// Seconds of keyboard inactivity before `typing=false` is sent
    pub typing_timeout_secs: u64,
    /// Seconds allowed for the realtime channel to connect and join
    pub connect_timeout_secs: u64,
    /// Stored session (token plus identity)
    pub session: Option<Session>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            typing_timeout_secs: DEFAULT_TYPING_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            session: None,
        }
    }
}

impl Config {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "ticket-chat", "ticket-chat")
            .context("Could not determine config directory")
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory for runtime files such as the TUI log.
    pub fn data_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains tokens)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Apply one-off endpoint overrides from the command line.
    pub fn with_overrides(mut self, api_url: Option<String>, socket_url: Option<String>) -> Self {
        if let Some(url) = api_url {
            self.api_url = url;
        }
        if let Some(url) = socket_url {
            self.socket_url = url;
        }
        self
    }

    pub fn typing_timeout(&self) -> Duration {
        Duration::from_secs(self.typing_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl TokenStore for Config {
    fn get_session(&self) -> Option<Session> {
        self.session.clone()
    }

    fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    fn clear_session(&mut self) {
        self.session = None;
    }
}
