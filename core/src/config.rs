//! Startup configuration from defaults and `ONECLICKRUNNER_*` overrides.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{LauncherError, Result};

pub const APP_NAME: &str = "OneClickRunner";

pub const DEFAULT_INSTANCE_NAME: &str = "OneClickRunner-8f1d2c";
pub const DEFAULT_CHANNEL_PORT: u16 = 47631;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);
#[cfg(unix)]
pub const DEFAULT_ELEVATION_WRAPPER: &str = "pkexec";

pub const ENV_HOME: &str = "ONECLICKRUNNER_HOME";
pub const ENV_INSTANCE: &str = "ONECLICKRUNNER_INSTANCE";
pub const ENV_PORT: &str = "ONECLICKRUNNER_PORT";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "ONECLICKRUNNER_CONNECT_TIMEOUT_MS";
pub const ENV_DOWNLOADS: &str = "ONECLICKRUNNER_DOWNLOADS";
pub const ENV_ELEVATE_WITH: &str = "ONECLICKRUNNER_ELEVATE_WITH";

const CATALOG_FILE: &str = "config.json";
const LOG_FILE: &str = "activity.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    /// Directory holding the catalog and the activity log.
    pub data_dir: PathBuf,
    /// Name of the system-wide instance lock.
    pub instance_name: String,
    /// Loopback port of the command channel.
    pub channel_port: u16,
    pub connect_timeout: Duration,
    /// Fixed destination directory for the download prompt target.
    pub download_dir: PathBuf,
    /// Program prefixed to elevated launches on unix. `None` runs unwrapped.
    pub elevation_wrapper: Option<String>,
}

impl LauncherConfig {
    /// Defaults rooted at `data_dir`, without looking at the environment.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let download_dir = dirs::download_dir().unwrap_or_else(|| data_dir.join("downloads"));

        Self {
            data_dir,
            instance_name: DEFAULT_INSTANCE_NAME.to_string(),
            channel_port: DEFAULT_CHANNEL_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            download_dir,
            elevation_wrapper: default_elevation_wrapper(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the configuration using `lookup` for environment values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = match lookup(ENV_HOME).filter(|v| !v.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_NAME))
                .ok_or_else(|| {
                    LauncherError::Config(format!(
                        "no config directory available, set {}",
                        ENV_HOME
                    ))
                })?,
        };

        let mut config = Self::with_data_dir(data_dir);

        if let Some(name) = lookup(ENV_INSTANCE).filter(|v| !v.trim().is_empty()) {
            config.instance_name = name;
        }

        if let Some(port) = lookup(ENV_PORT) {
            config.channel_port = port.trim().parse().map_err(|_| {
                LauncherError::Config(format!("{} must be a port number, got '{}'", ENV_PORT, port))
            })?;
        }

        if let Some(ms) = lookup(ENV_CONNECT_TIMEOUT_MS) {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                LauncherError::Config(format!(
                    "{} must be a number of milliseconds, got '{}'",
                    ENV_CONNECT_TIMEOUT_MS, ms
                ))
            })?;
            config.connect_timeout = Duration::from_millis(ms);
        }

        if let Some(dir) = lookup(ENV_DOWNLOADS).filter(|v| !v.trim().is_empty()) {
            config.download_dir = PathBuf::from(dir);
        }

        if let Some(wrapper) = lookup(ENV_ELEVATE_WITH) {
            let wrapper = wrapper.trim();
            config.elevation_wrapper = (!wrapper.is_empty()).then(|| wrapper.to_string());
        }

        Ok(config)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join(CATALOG_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }
}

#[cfg(unix)]
fn default_elevation_wrapper() -> Option<String> {
    Some(DEFAULT_ELEVATION_WRAPPER.to_string())
}

#[cfg(not(unix))]
fn default_elevation_wrapper() -> Option<String> {
    None
}
