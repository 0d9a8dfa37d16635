use crate::error::UploadsError;
use clap::Parser;
use serde::Deserialize;
use std::{fs, path::Path};

/// Serves the blog's uploads browser.
#[derive(Debug, Clone, Parser)]
#[command(version)]
pub struct StartArgs {
    /// JSON file holding the uploads disk configuration.
    #[arg(short, long, default_value = "blogshelf.json")]
    pub config_path: String,

    #[arg(short, long, default_value = "127.0.0.1")]
    pub address: String,

    #[arg(short, long, default_value_t = 3030)]
    pub port: u16,

    /// One of trace, debug, info, warn or error.
    #[arg(short, long, default_value = "info")]
    pub log_level: tracing::Level,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Public URL of the application. Relative web paths of uploaded files
    /// are resolved against it. Overridden by `APP_URL`.
    pub url: Option<String>,

    pub uploads: UploadsConfig,
}

impl Config {
    pub fn read(path: impl AsRef<Path>) -> Result<Self, UploadsError> {
        let config = fs::read_to_string(path)?;
        Self::parse(&config)
    }

    pub fn parse(config: &str) -> Result<Self, UploadsError> {
        let config: Self = serde_json::from_str(config)?;

        if config.uploads.storage == StorageDriver::Local && config.uploads.root.is_none() {
            return Err(UploadsError::Config(
                "uploads.root is required for the local storage driver".to_string(),
            ));
        }

        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadsConfig {
    /// Which disk holds the uploads.
    pub storage: StorageDriver,

    /// Directory of the local disk.
    pub root: Option<String>,

    /// Prefix under which uploaded files are browsable, either a path on this
    /// server (`/uploads`) or a full URL.
    #[serde(default = "default_webpath")]
    pub webpath: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    Local,
    Memory,
}

fn default_webpath() -> String {
    "/uploads".to_string()
}
