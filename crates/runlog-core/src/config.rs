//! Server configuration for RunLog
//!
//! Values come from built-in defaults, an optional TOML file, and finally
//! command line / environment overrides applied by the daemon.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// How the change notifier learns about file activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotifierBackend {
    /// OS filesystem events (inotify, FSEvents, kqueue, ReadDirectoryChangesW)
    #[default]
    Native,
    /// Re-stat polling, for filesystems without native events
    Poll {
        #[serde(default = "default_poll_interval_ms")]
        interval_ms: u64,
    },
}

impl NotifierBackend {
    pub fn poll() -> Self {
        NotifierBackend::Poll {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }

    /// Poll interval, if this is the polling backend
    pub fn poll_interval(&self) -> Option<Duration> {
        match self {
            NotifierBackend::Native => None,
            NotifierBackend::Poll { interval_ms } => Some(Duration::from_millis(*interval_ms)),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from(LOGS_DIR)
}

fn default_route_prefix() -> String {
    DEFAULT_ROUTE_PREFIX.to_string()
}

/// Server configuration (runlog.toml)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Directory holding one file per run
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
    /// Path segment in front of `{run_id}`
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,
    #[serde(default)]
    pub notifier: NotifierBackend,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: default_host(),
            logs_dir: default_logs_dir(),
            route_prefix: default_route_prefix(),
            notifier: NotifierBackend::default(),
        }
    }
}

impl ServerConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML config content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        let prefix = self.route_prefix.as_str();
        if prefix.is_empty() || prefix.contains('/') || prefix.contains(':') {
            return Err(Error::config(format!(
                "route_prefix must be a single path segment, got {:?}",
                prefix
            )));
        }

        if let NotifierBackend::Poll { interval_ms: 0 } = self.notifier {
            return Err(Error::config("poll interval must be greater than zero"));
        }

        Ok(())
    }

    /// Socket address string to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Route for run log endpoints, in axum path syntax
    pub fn run_route(&self) -> String {
        format!("/{}/:run_id", self.route_prefix)
    }
}
