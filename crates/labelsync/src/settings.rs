// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Layered client configuration.
//!
//! Values are resolved from, in increasing priority:
//!
//! 1. Built-in defaults
//! 2. `config.toml` in the platform config directory (optional)
//! 3. `LABELSYNC_*` environment variables (`LABELSYNC_SERVER`,
//!    `LABELSYNC_TIMEOUT`, `LABELSYNC_MAX_RETRIES`, `LABELSYNC_API_KEY`)
//!
//! ```toml
//! server = "https://darwin.v7labs.com"
//! timeout = 60
//! max_retries = 5
//! ```

use config::{Config, Environment, File};
use directories::ProjectDirs;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::Error;

pub const DEFAULT_SERVER: &str = "https://darwin.v7labs.com";

/// Client settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    /// Base URL of the dataset service, without the `/api` suffix.
    pub server: String,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Transport retries per request.
    pub max_retries: u32,
    /// API key, if configured outside of the key storage.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: DEFAULT_SERVER.to_string(),
            timeout: 30,
            max_retries: 3,
            api_key: None,
        }
    }
}

impl Settings {
    /// Path of the default configuration file, if a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "labelsync", "labelsync")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Loads settings from the default file and the environment.
    pub fn load() -> Result<Self, Error> {
        Self::load_from(Self::default_path().as_deref())
    }

    /// Loads settings from `path` (if given and present) and the environment.
    pub fn load_from(path: Option<&Path>) -> Result<Self, Error> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("server", defaults.server)?
            .set_default("timeout", defaults.timeout)?
            .set_default("max_retries", defaults.max_retries as u64)?;

        if let Some(path) = path {
            debug!("Loading settings from {:?}", path);
            builder = builder.add_source(File::from(path).required(false));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix("LABELSYNC").try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(settings.normalized())
    }

    /// Strips trailing slashes and an `/api` suffix from the server URL.
    fn normalized(mut self) -> Self {
        let mut server = self.server.trim().trim_end_matches('/').to_string();
        if let Some(stripped) = server.strip_suffix("/api") {
            server = stripped.to_string();
        }
        self.server = server;
        self
    }
}
