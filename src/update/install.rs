//! Archive extraction and in-place replacement
//!
//! Runs on the shell thread after a completed download. Extraction goes to
//! a scratch directory first; the live image directory and the running
//! binary are only touched once the whole archive unpacked cleanly.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{info, warn};
use zip::ZipArchive;

use super::UpdateError;
use crate::constants::update;

/// Contents of a release archive unpacked into a scratch directory.
/// Dropping it removes the scratch tree.
pub struct Extracted {
    scratch: TempDir,
}

impl Extracted {
    pub fn root(&self) -> &Path {
        self.scratch.path()
    }
}

/// What happened to the running binary during installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryUpdate {
    /// The archive carried no file matching the running binary's name
    NotIncluded,
    /// The new binary is in place; a restart picks it up
    Replaced,
    /// Assets were already merged but the binary swap failed
    Failed(String),
}

/// Outcome of a completed installation pass.
#[derive(Debug)]
pub struct InstallReport {
    pub assets_updated: usize,
    pub binary: BinaryUpdate,
}

/// Unpacks the downloaded archive into a fresh scratch directory. Entries
/// that would escape the scratch root are skipped. On failure the scratch
/// directory is kept on disk for inspection.
pub fn extract_archive(archive: &Path) -> Result<Extracted, UpdateError> {
    let scratch = tempfile::Builder::new()
        .prefix("winstreak-update-")
        .tempdir()
        .map_err(|err| UpdateError::Io(err.to_string()))?;

    match unpack(archive, scratch.path()) {
        Ok(entries) => {
            info!(entries, root = %scratch.path().display(), "archive extracted");
            Ok(Extracted { scratch })
        }
        Err(err) => {
            let kept = scratch.keep();
            warn!(root = %kept.display(), "extraction failed, scratch directory kept");
            Err(err)
        }
    }
}

fn unpack(archive: &Path, root: &Path) -> Result<usize, UpdateError> {
    let file = File::open(archive).map_err(|err| UpdateError::Io(err.to_string()))?;
    let mut zip = ZipArchive::new(file).map_err(|err| UpdateError::Archive(err.to_string()))?;
    let mut entries = 0;
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|err| UpdateError::Archive(err.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(name = %entry.name(), "skipping archive entry outside the root");
            continue;
        };
        let dest = root.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&dest).map_err(|err| UpdateError::Archive(err.to_string()))?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|err| UpdateError::Archive(err.to_string()))?;
        }
        let mut out = File::create(&dest).map_err(|err| UpdateError::Archive(err.to_string()))?;
        io::copy(&mut entry, &mut out).map_err(|err| UpdateError::Archive(err.to_string()))?;
        entries += 1;
    }
    Ok(entries)
}

/// Merges the archive's asset subtree into the image directory, then swaps
/// the running binary when the archive carries one. Asset failures abort
/// before the binary is touched; a binary failure is reported per file so
/// the merged assets are not thrown away.
pub fn apply(
    extracted: &Extracted,
    image_dir: &Path,
    exe_path: &Path,
) -> Result<InstallReport, UpdateError> {
    let assets_root = extracted.root().join(update::ASSET_SUBTREE);
    let assets_updated = if assets_root.is_dir() {
        let mut copied = 0;
        merge_tree(&assets_root, image_dir, &mut copied)
            .map_err(|err| UpdateError::AssetCopy(err.to_string()))?;
        copied
    } else {
        0
    };

    let binary = match bundled_binary(extracted.root(), exe_path) {
        Some(source) => match replace_binary(&source, exe_path) {
            Ok(()) => BinaryUpdate::Replaced,
            Err(reason) => BinaryUpdate::Failed(reason),
        },
        None => BinaryUpdate::NotIncluded,
    };

    info!(assets = assets_updated, binary = ?binary, "installation finished");
    Ok(InstallReport {
        assets_updated,
        binary,
    })
}

fn merge_tree(source: &Path, dest: &Path, copied: &mut usize) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            merge_tree(&entry.path(), &target, copied)?;
        } else {
            fs::copy(entry.path(), &target)?;
            *copied += 1;
        }
    }
    Ok(())
}

/// The new binary is the top-level archive entry sharing the running
/// binary's file name.
fn bundled_binary(root: &Path, exe_path: &Path) -> Option<PathBuf> {
    let name = exe_path.file_name()?;
    let candidate = root.join(name);
    candidate.is_file().then_some(candidate)
}

/// Stages the new binary next to the running one, preserves the current
/// binary under the `.old` suffix, then renames the staged copy over the
/// live path. The swap is a single same-directory rename, so the live path
/// holds a complete executable at every instant; any earlier failure
/// leaves the old binary untouched.
fn replace_binary(source: &Path, exe_path: &Path) -> Result<(), String> {
    let staged = suffixed_path(exe_path, update::NEW_BINARY_SUFFIX);
    fs::copy(source, &staged)
        .map_err(|err| format!("could not stage {}: {err}", staged.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(err) = fs::set_permissions(&staged, fs::Permissions::from_mode(0o755)) {
            let _ = fs::remove_file(&staged);
            return Err(format!(
                "could not mark {} executable: {err}",
                staged.display()
            ));
        }
    }
    let backup = suffixed_path(exe_path, update::OLD_BINARY_SUFFIX);
    if let Err(err) = fs::copy(exe_path, &backup) {
        let _ = fs::remove_file(&staged);
        return Err(format!("could not preserve {}: {err}", exe_path.display()));
    }
    if let Err(err) = fs::rename(&staged, exe_path) {
        let _ = fs::remove_file(&staged);
        return Err(format!("could not install new binary: {err}"));
    }
    Ok(())
}

fn suffixed_path(exe_path: &Path, suffix: &str) -> PathBuf {
    let mut name = exe_path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    exe_path.with_file_name(name)
}
