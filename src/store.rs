//! Profile and streak state store
//!
//! In-memory model of named profiles, each mapping character keys to streak
//! records. Every mutation is written through to the profile document; when
//! the write fails the in-memory change is kept and the error is surfaced,
//! so a bad disk never rolls back a recorded win.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::persist::{self, DocumentError};

/// Streak record for one character inside one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    #[serde(default)]
    pub wins: u64,
    #[serde(default)]
    pub current_streak: u64,
    #[serde(default)]
    pub personal_best: u64,
    /// True until the first streak is finalized; drives the live sentinel
    /// in the overlay output.
    #[serde(default = "default_live")]
    pub live: bool,
    /// User-chosen portrait override; the stock portrait applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
}

fn default_live() -> bool {
    true
}

impl Default for CharacterRecord {
    fn default() -> Self {
        Self {
            wins: 0,
            current_streak: 0,
            personal_best: 0,
            live: true,
            image_path: None,
        }
    }
}

/// Character key -> streak record, one map per profile.
pub type ProfileMap = HashMap<String, CharacterRecord>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a profile named '{0}' already exists")]
    DuplicateProfile(String),
    #[error("no profile named '{0}'")]
    ProfileNotFound(String),
    #[error(transparent)]
    Storage(#[from] DocumentError),
}

pub struct StreakStore {
    profiles: HashMap<String, ProfileMap>,
    path: PathBuf,
}

impl StreakStore {
    /// Loads the profile document, starting empty when it is missing. A
    /// malformed document is demoted to a warning so the session can still
    /// start; the broken file is overwritten by the next successful save.
    pub fn load_or_default(path: PathBuf) -> Self {
        let profiles = match persist::load_document_or_default(&path) {
            Ok(profiles) => profiles,
            Err(err) => {
                warn!(error = %err, "profile document unreadable, starting empty");
                HashMap::new()
            }
        };
        Self { profiles, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Profile names sorted for stable listing.
    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_profile(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    pub fn create_profile(&mut self, name: &str) -> Result<(), StoreError> {
        if self.profiles.contains_key(name) {
            return Err(StoreError::DuplicateProfile(name.to_string()));
        }
        self.profiles.insert(name.to_string(), ProfileMap::new());
        info!(profile = %name, "profile created");
        self.persist()
    }

    /// Removes a profile and every record in it.
    pub fn delete_profile(&mut self, name: &str) -> Result<(), StoreError> {
        if self.profiles.remove(name).is_none() {
            return Err(StoreError::ProfileNotFound(name.to_string()));
        }
        info!(profile = %name, "profile deleted");
        self.persist()
    }

    /// Returns the record for a character, inserting a zeroed one into the
    /// in-memory map on first access. Nothing touches disk until the next
    /// mutation persists the whole document.
    pub fn get_or_create(&mut self, profile: &str, key: &str) -> CharacterRecord {
        self.record_mut(profile, key).clone()
    }

    /// Read-only peek; `None` when the character has no record yet.
    pub fn get(&self, profile: &str, key: &str) -> Option<&CharacterRecord> {
        self.profiles.get(profile).and_then(|map| map.get(key))
    }

    /// Records one win: total wins and the running streak both advance.
    pub fn record_win(&mut self, profile: &str, key: &str) -> Result<CharacterRecord, StoreError> {
        let record = self.record_mut(profile, key);
        record.wins += 1;
        record.current_streak += 1;
        let snapshot = record.clone();
        info!(
            profile = %profile,
            character = %key,
            streak = snapshot.current_streak,
            "win recorded"
        );
        self.persist()?;
        Ok(snapshot)
    }

    /// Finalizes the running streak: the personal best absorbs it when it is
    /// higher and the record leaves its live phase. The streak counter keeps
    /// its value and keeps running. Does nothing while the streak is zero.
    pub fn finish_streak(&mut self, profile: &str, key: &str) -> Result<CharacterRecord, StoreError> {
        let record = self.record_mut(profile, key);
        if record.current_streak == 0 {
            return Ok(record.clone());
        }
        record.personal_best = record.personal_best.max(record.current_streak);
        record.live = false;
        let snapshot = record.clone();
        info!(
            profile = %profile,
            character = %key,
            best = snapshot.personal_best,
            "streak finalized"
        );
        self.persist()?;
        Ok(snapshot)
    }

    /// Starts the character over: wins and streak go back to zero. The
    /// personal best and the live phase survive a reset.
    pub fn reset_streak(&mut self, profile: &str, key: &str) -> Result<CharacterRecord, StoreError> {
        let record = self.record_mut(profile, key);
        record.wins = 0;
        record.current_streak = 0;
        let snapshot = record.clone();
        info!(profile = %profile, character = %key, "streak reset");
        self.persist()?;
        Ok(snapshot)
    }

    /// Sets or clears the portrait override for a character.
    pub fn set_image_override(
        &mut self,
        profile: &str,
        key: &str,
        image: Option<PathBuf>,
    ) -> Result<CharacterRecord, StoreError> {
        let record = self.record_mut(profile, key);
        record.image_path = image;
        let snapshot = record.clone();
        self.persist()?;
        Ok(snapshot)
    }

    /// Writes the whole document. Runs after every mutation; also usable
    /// directly to flush lazily created records.
    pub fn persist(&self) -> Result<(), StoreError> {
        persist::save_document(&self.path, &self.profiles)?;
        Ok(())
    }

    /// Writes a full copy of every profile to an arbitrary path.
    pub fn export(&self, path: &Path) -> Result<(), StoreError> {
        persist::save_document(path, &self.profiles)?;
        info!(path = %path.display(), profiles = self.profiles.len(), "profiles exported");
        Ok(())
    }

    /// Merges profiles from an exported document. A profile sharing a name
    /// with an existing one is replaced wholesale; others are added.
    /// Returns the number of profiles brought in.
    pub fn import(&mut self, path: &Path) -> Result<usize, StoreError> {
        let imported: HashMap<String, ProfileMap> = persist::load_document(path)?;
        let count = imported.len();
        for (name, characters) in imported {
            self.profiles.insert(name, characters);
        }
        info!(path = %path.display(), profiles = count, "profiles imported");
        self.persist()?;
        Ok(count)
    }

    fn record_mut(&mut self, profile: &str, key: &str) -> &mut CharacterRecord {
        self.profiles
            .entry(profile.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
    }
}
