//! Application-wide constants
//!
//! This module contains the directory names, artifact names and tuning values
//! used throughout the application, providing a single source of truth.

/// Durable document locations
pub mod paths {
    /// Directory under the per-user config dir holding the durable documents
    pub const APP_DIR: &str = "winstreak-tracker";

    /// Profile collection document (profile name -> character records)
    pub const PROFILES_FILE: &str = "profiles.json";

    /// Flat options document
    pub const SETTINGS_FILE: &str = "settings.json";

    /// Output directory under the per-user documents dir, polled by the overlay
    pub const OUTPUT_DIR: &str = "Winstreaks";

    /// Character and role image assets, kept inside the output directory
    pub const IMAGE_DIR: &str = "images";
}

/// Output artifact names (fixed contract with the overlay renderer)
pub mod artifacts {
    /// Current streak counter as plain text
    pub const CURRENT_STREAK: &str = "Current Streak.txt";

    /// Personal best as plain text, or the live sentinel
    pub const CURRENT_BEST: &str = "Current Best.txt";

    /// Combined snapshot of the active record as JSON
    pub const CURRENT_STATS: &str = "Current Stats.json";

    /// Display name of the active character
    pub const CURRENT_CHARACTER: &str = "Current Character.txt";

    /// Portrait of the active character
    pub const CURRENT_CHARACTER_IMAGE: &str = "Current Character.png";

    /// Role icon for the active character
    pub const CURRENT_ROLE_IMAGE: &str = "Current Role.png";

    /// Per-role streak icon
    pub const STREAK_ICON: &str = "Streak Icon.png";

    /// Written instead of a number while no personal best is finalized
    pub const LIVE_SENTINEL: &str = "LIVE";
}

/// Stock asset names inside the image directory
pub mod assets {
    /// Role icon shown while a killer is active
    pub const KILLER_ICON: &str = "Killer Icon.png";

    /// Role icon shown while a survivor mode is active
    pub const SURVIVOR_ICON: &str = "Survivor Icon.png";

    /// Streak icon shown while a survivor mode is active
    pub const ESCAPE_ICON: &str = "Escape Icon.png";

    /// Side length in pixels of the transparent placeholder icon
    pub const PLACEHOLDER_SIZE: u32 = 300;
}

/// Self-update endpoints and tuning
pub mod update {
    /// Remote manifest describing the latest release
    pub const MANIFEST_URL: &str =
        "https://raw.githubusercontent.com/BrokenAnarchist/DBD-Winstreak-Tracker/main/release.json";

    /// Download chunk size; progress is reported once per chunk
    pub const CHUNK_SIZE: usize = 64 * 1024;

    /// HTTP timeout for the manifest request (seconds)
    pub const CHECK_TIMEOUT_SECS: u64 = 10;

    /// Connect timeout for the archive download (seconds)
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Archive subtree merged into the local image directory
    pub const ASSET_SUBTREE: &str = "images";

    /// Suffix under which the previous binary is preserved after a swap
    pub const OLD_BINARY_SUFFIX: &str = "old";

    /// Suffix for the staged new binary before it is renamed into place
    pub const NEW_BINARY_SUFFIX: &str = "new";
}
