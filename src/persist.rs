//! Durable document persistence
//!
//! Generic load/save of the named JSON documents kept under the per-user
//! config directory, plus resolution of the standard on-disk locations.
//! Owns no business meaning; the store and settings modules decide what
//! the documents contain.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::constants::paths;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Resolved locations of the durable documents and the overlay output tree.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl AppPaths {
    /// Resolves the standard per-user locations, honoring CLI overrides.
    pub fn resolve(config_dir: Option<PathBuf>, output_dir: Option<PathBuf>) -> Self {
        let config_dir = config_dir.unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(paths::APP_DIR)
        });
        let output_dir = output_dir.unwrap_or_else(|| {
            dirs::document_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(paths::OUTPUT_DIR)
        });
        Self {
            config_dir,
            output_dir,
        }
    }

    pub fn profiles_file(&self) -> PathBuf {
        self.config_dir.join(paths::PROFILES_FILE)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join(paths::SETTINGS_FILE)
    }

    pub fn image_dir(&self) -> PathBuf {
        self.output_dir.join(paths::IMAGE_DIR)
    }
}

/// Reads a JSON document, failing if it is missing or malformed.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, DocumentError> {
    let raw = fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| DocumentError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a JSON document, falling back to the default when the file does
/// not exist yet. Malformed content is still an error; the caller decides
/// whether that is fatal.
pub fn load_document_or_default<T>(path: &Path) -> Result<T, DocumentError>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    load_document(path)
}

/// Serializes a document and writes it in place, creating parent
/// directories on first use.
pub fn save_document<T: Serialize>(path: &Path, value: &T) -> Result<(), DocumentError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| DocumentError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let raw = serde_json::to_string_pretty(value).map_err(|source| DocumentError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, raw).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })
}
