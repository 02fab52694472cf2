//! Overlay output synchronization
//!
//! Materializes the active character's record into the fixed artifact set
//! polled by the overlay renderer. Text artifacts are overwritten on every
//! pass; image artifacts are only replaced when their source exists, so a
//! missing portrait leaves the previous one on screen instead of blanking
//! the overlay.

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use tracing::debug;

use crate::characters::{CharacterKey, Role};
use crate::constants::{artifacts, assets};
use crate::store::CharacterRecord;

pub struct OutputSync {
    output_dir: PathBuf,
    image_dir: PathBuf,
}

impl OutputSync {
    pub fn new(output_dir: PathBuf, image_dir: PathBuf) -> Self {
        Self {
            output_dir,
            image_dir,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Creates the output tree. Run once at session start and again before
    /// every sync in case the user removed it mid-session.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;
        fs::create_dir_all(&self.image_dir)
            .with_context(|| format!("failed to create {}", self.image_dir.display()))?;
        Ok(())
    }

    /// Source image for a record. The user override wins even when its file
    /// is gone (the copy is then skipped and the previous artifact stays);
    /// the stock portrait applies only while it exists on disk.
    pub fn resolve_image(&self, key: &CharacterKey, record: &CharacterRecord) -> Option<PathBuf> {
        if let Some(path) = &record.image_path {
            return Some(path.clone());
        }
        let stock = self.image_dir.join(key.default_image_name());
        stock.exists().then_some(stock)
    }

    /// Rewrites the whole artifact set for the active character.
    pub fn sync(&self, key: &CharacterKey, record: &CharacterRecord) -> Result<()> {
        self.ensure_dirs()?;

        self.write_text(artifacts::CURRENT_STREAK, &record.current_streak.to_string())?;
        let best = if record.live {
            artifacts::LIVE_SENTINEL.to_string()
        } else {
            record.personal_best.to_string()
        };
        self.write_text(artifacts::CURRENT_BEST, &best)?;
        self.write_text(artifacts::CURRENT_CHARACTER, key.display_name())?;
        self.write_stats(key, record)?;
        self.copy_portrait(key, record)?;
        self.copy_role_icon(key)?;
        self.write_streak_icon(key)?;

        debug!(character = %key, streak = record.current_streak, "output synchronized");
        Ok(())
    }

    fn write_text(&self, name: &str, value: &str) -> Result<()> {
        let path = self.output_dir.join(name);
        fs::write(&path, value).with_context(|| format!("failed to write {}", path.display()))
    }

    fn write_stats(&self, key: &CharacterKey, record: &CharacterRecord) -> Result<()> {
        let best = if record.live {
            json!(artifacts::LIVE_SENTINEL)
        } else {
            json!(record.personal_best)
        };
        let stats = json!({
            "character": key.display_name(),
            "wins": record.wins,
            "current_streak": record.current_streak,
            "personal_best": best,
        });
        let raw =
            serde_json::to_string_pretty(&stats).context("failed to serialize stats artifact")?;
        self.write_text(artifacts::CURRENT_STATS, &raw)
    }

    fn copy_portrait(&self, key: &CharacterKey, record: &CharacterRecord) -> Result<()> {
        let Some(source) = self.resolve_image(key, record) else {
            return Ok(());
        };
        if !source.exists() {
            debug!(source = %source.display(), "portrait missing, keeping previous artifact");
            return Ok(());
        }
        let dest = self.output_dir.join(artifacts::CURRENT_CHARACTER_IMAGE);
        fs::copy(&source, &dest)
            .with_context(|| format!("failed to copy {}", source.display()))?;
        Ok(())
    }

    fn copy_role_icon(&self, key: &CharacterKey) -> Result<()> {
        let icon = match key.role() {
            Role::Killer => assets::KILLER_ICON,
            Role::Survivor => assets::SURVIVOR_ICON,
        };
        let source = self.image_dir.join(icon);
        if !source.exists() {
            return Ok(());
        }
        let dest = self.output_dir.join(artifacts::CURRENT_ROLE_IMAGE);
        fs::copy(&source, &dest)
            .with_context(|| format!("failed to copy {}", source.display()))?;
        Ok(())
    }

    /// Survivors reuse the escape icon; killers get a transparent square so
    /// the overlay slot stays reserved without showing anything.
    fn write_streak_icon(&self, key: &CharacterKey) -> Result<()> {
        let dest = self.output_dir.join(artifacts::STREAK_ICON);
        match key.role() {
            Role::Survivor => {
                let source = self.image_dir.join(assets::ESCAPE_ICON);
                if source.exists() {
                    fs::copy(&source, &dest)
                        .with_context(|| format!("failed to copy {}", source.display()))?;
                }
                Ok(())
            }
            Role::Killer => write_transparent_png(&dest, assets::PLACEHOLDER_SIZE),
        }
    }
}

/// Writes a fully transparent RGBA square.
fn write_transparent_png(path: &Path, size: u32) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), size, size);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .context("failed to write PNG header")?;
    let pixels = vec![0u8; size as usize * size as usize * 4];
    writer
        .write_image_data(&pixels)
        .context("failed to write PNG data")?;
    writer.finish().context("failed to finish PNG stream")?;
    Ok(())
}
