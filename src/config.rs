//! Process configuration
//!
//! Loaded from a JSON file (camelCase keys) and then overridden by CLI flags.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::filesystem::config::FileSystemConfig;
use crate::filesystem::roots::{RootConfig, RootError};

/// Config file read when `--config` is not given, if it exists
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid bind address '{0}'")]
    BindAddress(String),
    #[error("invalid filesystem settings: {0}")]
    Invalid(String),
    #[error(transparent)]
    Roots(#[from] RootError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub bind: String,
    pub port: u16,
    /// Front-end assets served under `/static`
    pub static_dir: PathBuf,
    /// Single-root form; registered ahead of `roots`
    pub root_dir: Option<PathBuf>,
    pub roots: Vec<RootConfig>,
    pub filesystem: FileSystemConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from("static"),
            root_dir: None,
            roots: Vec::new(),
            filesystem: FileSystemConfig::default(),
        }
    }
}

impl Config {
    /// Load an explicit config file, or `config.json` when present, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Roots to register, in order. Falls back to the home directory (or the
    /// working directory) when nothing is configured.
    pub fn root_configs(&self) -> Vec<RootConfig> {
        let mut roots = Vec::new();
        if let Some(dir) = &self.root_dir {
            roots.push(RootConfig::new("", dir));
        }
        roots.extend(self.roots.iter().cloned());

        if roots.is_empty() {
            let fallback = dirs_next::home_dir().or_else(|| std::env::current_dir().ok());
            roots.extend(fallback.map(|dir| RootConfig::new("home", dir)));
        }
        roots
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind
            .parse()
            .map_err(|_| ConfigError::BindAddress(self.bind.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filesystem.validate().map_err(ConfigError::Invalid)?;
        self.bind_addr()?;
        Ok(())
    }
}

/// Parse a `--root` value: `NAME=PATH` or a bare `PATH`
pub fn parse_root_arg(value: &str) -> Result<RootConfig, String> {
    let (name, path) = match value.split_once('=') {
        Some((name, path)) => (name.trim(), path),
        None => ("", value),
    };
    if path.is_empty() {
        return Err(format!("missing path in root '{}'", value));
    }
    Ok(RootConfig::new(name, path))
}
