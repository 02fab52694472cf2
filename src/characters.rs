//! Character roster and key model
//!
//! A trackable character is either one of the fixed killer names or a
//! survivor group size. Keys carry a canonical string form used by the
//! profile document ("The Trapper", "Survivor - 2 Survivors") and collapse
//! to a short display name for the overlay.

use std::fmt;

/// Killer roster in release order. Selection is validated against this list;
/// records imported under other keys are kept but cannot be selected.
pub const KILLERS: [&str; 40] = [
    "The Trapper",
    "The Wraith",
    "The Hillbilly",
    "The Nurse",
    "The Shape",
    "The Hag",
    "The Doctor",
    "The Huntress",
    "The Cannibal",
    "The Nightmare",
    "The Pig",
    "The Clown",
    "The Spirit",
    "The Legion",
    "The Plague",
    "The Ghost Face",
    "The Demogorgon",
    "The Oni",
    "The Deathslinger",
    "The Executioner",
    "The Blight",
    "The Twins",
    "The Trickster",
    "The Nemesis",
    "The Cenobite",
    "The Artist",
    "The Onryō",
    "The Dredge",
    "The Mastermind",
    "The Knight",
    "The Skull Merchant",
    "The Singularity",
    "The Xenomorph",
    "The Good Guy",
    "The Unknown",
    "The Lich",
    "The Dark Lord",
    "The Houndmaster",
    "The Ghoul",
    "The Animatronic",
];

/// Survivor group size being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurvivorMode {
    Solo,
    Two,
    Three,
    Four,
}

impl SurvivorMode {
    pub const ALL: [SurvivorMode; 4] = [
        SurvivorMode::Solo,
        SurvivorMode::Two,
        SurvivorMode::Three,
        SurvivorMode::Four,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SurvivorMode::Solo => "Solo",
            SurvivorMode::Two => "2 Survivors",
            SurvivorMode::Three => "3 Survivors",
            SurvivorMode::Four => "4 Survivors",
        }
    }

    /// Accepts the full label or the shorthand used by the shell
    /// ("solo", "1".."4", "duo").
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        for mode in Self::ALL {
            if trimmed.eq_ignore_ascii_case(mode.label()) {
                return Some(mode);
            }
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "solo" | "1" => Some(SurvivorMode::Solo),
            "duo" | "2" => Some(SurvivorMode::Two),
            "trio" | "3" => Some(SurvivorMode::Three),
            "4" => Some(SurvivorMode::Four),
            _ => None,
        }
    }
}

/// Which side of the match a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Killer,
    Survivor,
}

/// Canonical identity of a trackable character
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CharacterKey {
    Killer(String),
    Survivor(SurvivorMode),
}

impl CharacterKey {
    /// Parses a roster killer name or a survivor key. Survivor keys accept
    /// the document form ("Survivor - 2 Survivors"), a bare mode label, or
    /// plain "Survivor" for solo.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if let Some(rest) = strip_survivor_prefix(trimmed) {
            if rest.is_empty() {
                return Some(CharacterKey::Survivor(SurvivorMode::Solo));
            }
            return SurvivorMode::parse(rest).map(CharacterKey::Survivor);
        }
        KILLERS
            .iter()
            .find(|name| name.eq_ignore_ascii_case(trimmed))
            .map(|name| CharacterKey::Killer((*name).to_string()))
    }

    /// String form used as the key inside the profile document.
    pub fn storage_key(&self) -> String {
        match self {
            CharacterKey::Killer(name) => name.clone(),
            CharacterKey::Survivor(mode) => format!("Survivor - {}", mode.label()),
        }
    }

    /// Overlay-facing name. Survivor modes collapse to plain "Survivor".
    pub fn display_name(&self) -> &str {
        match self {
            CharacterKey::Killer(name) => name,
            CharacterKey::Survivor(_) => "Survivor",
        }
    }

    pub fn role(&self) -> Role {
        match self {
            CharacterKey::Killer(_) => Role::Killer,
            CharacterKey::Survivor(_) => Role::Survivor,
        }
    }

    /// File name of the stock portrait looked up in the image directory.
    pub fn default_image_name(&self) -> String {
        match self {
            CharacterKey::Killer(name) => format!("{name}.png"),
            CharacterKey::Survivor(mode) => format!("Survivor {}.png", mode.label()),
        }
    }
}

impl fmt::Display for CharacterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharacterKey::Killer(name) => f.write_str(name),
            CharacterKey::Survivor(mode) => write!(f, "Survivor - {}", mode.label()),
        }
    }
}

/// Splits off a leading "Survivor" (case-insensitive) plus optional
/// " - " separator, returning the remainder.
fn strip_survivor_prefix(input: &str) -> Option<&str> {
    const PREFIX: &str = "survivor";
    let head = input.get(..PREFIX.len())?;
    if !head.eq_ignore_ascii_case(PREFIX) {
        return None;
    }
    let rest = input[PREFIX.len()..].trim_start();
    let rest = rest.strip_prefix('-').unwrap_or(rest);
    Some(rest.trim_start())
}
