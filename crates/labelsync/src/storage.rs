// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! API key persistence.
//!
//! - [`FileKeyStorage`]: key file in the platform config directory
//! - [`MemoryKeyStorage`]: process-local, used by tests and embedders
//!
//! ```rust,no_run
//! use labelsync::{FileKeyStorage, KeyStorage};
//!
//! # fn main() -> Result<(), labelsync::Error> {
//! let storage = FileKeyStorage::new()?;
//! storage.store("my-api-key")?;
//! assert_eq!(storage.load()?, Some("my-api-key".to_string()));
//! # Ok(())
//! # }
//! ```

use directories::ProjectDirs;
use log::debug;
use std::{path::PathBuf, sync::RwLock};

use crate::Error;

/// Persistent storage for the API key used to authenticate with the service.
pub trait KeyStorage: Send + Sync {
    /// Store the API key, replacing any previous one.
    fn store(&self, key: &str) -> Result<(), Error>;

    /// Load the stored API key, `Ok(None)` when nothing is stored.
    fn load(&self) -> Result<Option<String>, Error>;

    /// Remove the stored API key. Clearing an empty storage is not an error.
    fn clear(&self) -> Result<(), Error>;
}

/// Stores the API key in a file, readable only by the owner on Unix.
///
/// Default location is `api_key` inside the platform config directory, e.g.
/// `~/.config/labelsync/api_key` on Linux.
#[derive(Debug, Clone)]
pub struct FileKeyStorage {
    path: PathBuf,
}

impl FileKeyStorage {
    pub fn new() -> Result<Self, Error> {
        let path = ProjectDirs::from("dev", "labelsync", "labelsync")
            .ok_or_else(|| {
                Error::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Could not determine user config directory",
                ))
            })?
            .config_dir()
            .join("api_key");

        debug!("FileKeyStorage using default path: {:?}", path);
        Ok(Self { path })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl KeyStorage for FileKeyStorage {
    fn store(&self, key: &str) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&self.path, key.trim())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        debug!("API key stored to {:?}", self.path);
        Ok(())
    }

    fn load(&self) -> Result<Option<String>, Error> {
        if !self.path.exists() {
            return Ok(None);
        }

        let key = std::fs::read_to_string(&self.path)?;
        let key = key.trim();
        if key.is_empty() {
            debug!("API key file at {:?} is empty", self.path);
            return Ok(None);
        }

        Ok(Some(key.to_string()))
    }

    fn clear(&self) -> Result<(), Error> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            debug!("API key file removed from {:?}", self.path);
        }
        Ok(())
    }
}

/// Keeps the API key in memory only.
#[derive(Debug, Default)]
pub struct MemoryKeyStorage {
    key: RwLock<Option<String>>,
}

impl MemoryKeyStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> Error {
    Error::IoError(std::io::Error::other(format!("key storage lock poisoned: {}", err)))
}

impl KeyStorage for MemoryKeyStorage {
    fn store(&self, key: &str) -> Result<(), Error> {
        *self.key.write().map_err(poisoned)? = Some(key.trim().to_string());
        Ok(())
    }

    fn load(&self) -> Result<Option<String>, Error> {
        Ok(self.key.read().map_err(poisoned)?.clone())
    }

    fn clear(&self) -> Result<(), Error> {
        *self.key.write().map_err(poisoned)? = None;
        Ok(())
    }
}
