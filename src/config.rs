//! Configuration management for FileVault Server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Default capacity of the streaming (upload/download) pool
pub const DEFAULT_MAX_STREAMING: usize = 10;

/// Default capacity of the unary (list) pool
pub const DEFAULT_MAX_UNARY: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Flat directory holding every stored file
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Concurrent uploads and downloads
    pub streaming: usize,
    /// Concurrent list calls
    pub unary: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 50051,
            },
            storage: StorageConfig {
                root: PathBuf::from("./uploads"),
            },
            limits: LimitsConfig {
                streaming: DEFAULT_MAX_STREAMING,
                unary: DEFAULT_MAX_UNARY,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source; missing values take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var(&lookup, "SERVER_PORT", defaults.server.port)?,
            },
            storage: StorageConfig {
                root: lookup("STORAGE_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.root),
            },
            limits: LimitsConfig {
                streaming: parse_var(&lookup, "MAX_STREAMING_REQUESTS", defaults.limits.streaming)?,
                unary: parse_var(&lookup, "MAX_UNARY_REQUESTS", defaults.limits.unary)?,
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}
