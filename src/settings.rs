//! Flat session options persisted alongside the profile document.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::persist::{self, DocumentError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Skips the automatic update check at session start. Manual checks
    /// stay available regardless.
    pub suppress_updates: bool,
}

impl Settings {
    /// Loads the options document, falling back to defaults when it is
    /// missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        match persist::load_document_or_default(path) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(error = %err, "settings document unreadable, using defaults");
                Settings::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        persist::save_document(path, self)
    }
}
