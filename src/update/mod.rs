//! Self-update pipeline
//!
//! Idle -> Checking -> {UpToDate | UpdateAvailable} -> Downloading ->
//! Extracting -> Replacing -> {Completed | Failed}, with a cancelled
//! download returning to Idle. The check and download run on worker
//! threads reporting over the session channel; extraction and replacement
//! run synchronously on the shell thread, which stays the only writer of
//! the image directory.

pub mod download;
pub mod install;
pub mod manifest;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;

use tempfile::TempDir;
use thiserror::Error;
use tracing::{info, warn};

use crate::constants::update::MANIFEST_URL;
use download::CheckRequest;
use install::BinaryUpdate;
use manifest::{UpdateManifest, VersionOrdering};

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("release manifest problem: {0}")]
    Manifest(String),
    #[error("i/o failure: {0}")]
    Io(String),
    #[error("archive extraction failed: {0}")]
    Archive(String),
    #[error("asset update failed: {0}")]
    AssetCopy(String),
    #[error("binary replacement failed: {0}")]
    BinaryReplace(String),
    #[error("an update operation is already running")]
    Busy,
}

/// Where the pipeline currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Checking,
    UpToDate,
    UpdateAvailable,
    Downloading,
    Extracting,
    Replacing,
    Completed,
    Failed,
}

impl UpdatePhase {
    pub fn label(&self) -> &'static str {
        match self {
            UpdatePhase::Idle => "idle",
            UpdatePhase::Checking => "checking",
            UpdatePhase::UpToDate => "up to date",
            UpdatePhase::UpdateAvailable => "update available",
            UpdatePhase::Downloading => "downloading",
            UpdatePhase::Extracting => "extracting",
            UpdatePhase::Replacing => "replacing binary",
            UpdatePhase::Completed => "installed, restart pending",
            UpdatePhase::Failed => "failed",
        }
    }
}

/// Worker-to-shell messages.
#[derive(Debug)]
pub enum UpdateEvent {
    Checked(Result<CheckOutcome, UpdateError>),
    Progress {
        received: u64,
        total: Option<u64>,
        percent: Option<u8>,
    },
    Downloaded(PathBuf),
    DownloadFailed(UpdateError),
    Cancelled,
}

#[derive(Debug, Clone)]
pub enum CheckOutcome {
    UpToDate { current: String, remote: String },
    UpdateAvailable(UpdateManifest),
}

/// What the shell should tell the user after an event was absorbed.
#[derive(Debug)]
pub enum UpdateNotice {
    CheckFailed {
        manual: bool,
        error: UpdateError,
    },
    UpToDate {
        manual: bool,
        current: String,
        remote: String,
    },
    Available {
        version: String,
        changelog: String,
    },
    Progress {
        received: u64,
        total: Option<u64>,
        percent: Option<u8>,
    },
    DownloadFailed(UpdateError),
    Cancelled,
    InstallFailed(UpdateError),
    /// Assets were merged but the binary swap failed
    PartiallyInstalled {
        assets_updated: usize,
        error: UpdateError,
    },
    /// Install finished cleanly; a failed swap never lands here, it is
    /// reported as `PartiallyInstalled`
    Installed {
        assets_updated: usize,
        binary_replaced: bool,
    },
}

/// Owns the pipeline state and the worker threads behind it. One operation
/// runs at a time; `begin_*` calls while a worker is out return `Busy`.
pub struct UpdateCoordinator {
    phase: UpdatePhase,
    current_version: String,
    manifest_url: String,
    ordering: VersionOrdering,
    manifest: Option<UpdateManifest>,
    manual_check: bool,
    events: Sender<UpdateEvent>,
    cancel: Option<Arc<AtomicBool>>,
    download_dir: Option<TempDir>,
    worker: Option<JoinHandle<()>>,
}

impl UpdateCoordinator {
    pub fn new(current_version: impl Into<String>, events: Sender<UpdateEvent>) -> Self {
        Self {
            phase: UpdatePhase::Idle,
            current_version: current_version.into(),
            manifest_url: MANIFEST_URL.to_string(),
            ordering: VersionOrdering::default(),
            manifest: None,
            manual_check: false,
            events,
            cancel: None,
            download_dir: None,
            worker: None,
        }
    }

    pub fn with_manifest_url(mut self, url: impl Into<String>) -> Self {
        self.manifest_url = url.into();
        self
    }

    pub fn with_ordering(mut self, ordering: VersionOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    pub fn pending_manifest(&self) -> Option<&UpdateManifest> {
        self.manifest.as_ref()
    }

    /// True while a worker owns the pipeline or an install pass is running.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            UpdatePhase::Checking
                | UpdatePhase::Downloading
                | UpdatePhase::Extracting
                | UpdatePhase::Replacing
        )
    }

    /// Kicks off a manifest check on a worker thread.
    pub fn begin_check(&mut self, manual: bool) -> Result<(), UpdateError> {
        if self.is_busy() {
            return Err(UpdateError::Busy);
        }
        self.manual_check = manual;
        self.phase = UpdatePhase::Checking;
        let request = CheckRequest {
            url: self.manifest_url.clone(),
            current_version: self.current_version.clone(),
            ordering: self.ordering,
        };
        info!(manual, url = %request.url, "checking for updates");
        self.worker = Some(download::spawn_check(request, self.events.clone()));
        Ok(())
    }

    /// Starts downloading the archive named by the pending manifest.
    pub fn begin_download(&mut self) -> Result<(), UpdateError> {
        if self.is_busy() {
            return Err(UpdateError::Busy);
        }
        let Some(manifest) = &self.manifest else {
            return Err(UpdateError::Manifest(
                "no pending update to download".to_string(),
            ));
        };
        let dir = tempfile::Builder::new()
            .prefix("winstreak-download-")
            .tempdir()
            .map_err(|err| UpdateError::Io(err.to_string()))?;
        let dest = dir.path().join("release-archive.zip");
        let cancel = Arc::new(AtomicBool::new(false));
        info!(version = %manifest.version, url = %manifest.archive_url, "downloading update");
        self.worker = Some(download::spawn_download(
            manifest.archive_url.clone(),
            dest,
            self.events.clone(),
            Arc::clone(&cancel),
        ));
        self.cancel = Some(cancel);
        self.download_dir = Some(dir);
        self.phase = UpdatePhase::Downloading;
        Ok(())
    }

    /// Requests cancellation; the worker acknowledges with a `Cancelled`
    /// event within one chunk. Returns false when nothing is downloading.
    pub fn cancel_download(&mut self) -> bool {
        match (&self.cancel, self.phase) {
            (Some(flag), UpdatePhase::Downloading) => {
                flag.store(true, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    /// Clears a pending update offer without acting on it.
    pub fn dismiss(&mut self) -> bool {
        if self.phase == UpdatePhase::UpdateAvailable {
            self.manifest = None;
            self.phase = UpdatePhase::Idle;
            true
        } else {
            false
        }
    }

    /// Absorbs one worker event, advancing the pipeline. Extraction and
    /// replacement happen here, on the caller's thread.
    pub fn handle_event(
        &mut self,
        event: UpdateEvent,
        image_dir: &Path,
        exe_path: &Path,
    ) -> UpdateNotice {
        match event {
            UpdateEvent::Checked(result) => {
                self.worker = None;
                match result {
                    Ok(CheckOutcome::UpdateAvailable(manifest)) => {
                        self.phase = UpdatePhase::UpdateAvailable;
                        let notice = UpdateNotice::Available {
                            version: manifest.version.clone(),
                            changelog: manifest.changelog.clone(),
                        };
                        self.manifest = Some(manifest);
                        notice
                    }
                    Ok(CheckOutcome::UpToDate { current, remote }) => {
                        self.phase = UpdatePhase::UpToDate;
                        UpdateNotice::UpToDate {
                            manual: self.manual_check,
                            current,
                            remote,
                        }
                    }
                    Err(error) => {
                        self.phase = UpdatePhase::Failed;
                        UpdateNotice::CheckFailed {
                            manual: self.manual_check,
                            error,
                        }
                    }
                }
            }
            UpdateEvent::Progress {
                received,
                total,
                percent,
            } => UpdateNotice::Progress {
                received,
                total,
                percent,
            },
            UpdateEvent::DownloadFailed(error) => {
                self.release_download();
                self.phase = UpdatePhase::Failed;
                UpdateNotice::DownloadFailed(error)
            }
            UpdateEvent::Cancelled => {
                self.release_download();
                self.manifest = None;
                self.phase = UpdatePhase::Idle;
                UpdateNotice::Cancelled
            }
            UpdateEvent::Downloaded(archive) => {
                self.worker = None;
                self.cancel = None;
                self.install(&archive, image_dir, exe_path)
            }
        }
    }

    fn install(&mut self, archive: &Path, image_dir: &Path, exe_path: &Path) -> UpdateNotice {
        self.phase = UpdatePhase::Extracting;
        let extracted = match install::extract_archive(archive) {
            Ok(extracted) => extracted,
            Err(error) => {
                // Keep the archive next to the kept scratch dir for inspection
                if let Some(dir) = self.download_dir.take() {
                    let kept = dir.keep();
                    warn!(archive_dir = %kept.display(), "downloaded archive kept");
                }
                self.phase = UpdatePhase::Failed;
                return UpdateNotice::InstallFailed(error);
            }
        };

        self.phase = UpdatePhase::Replacing;
        let notice = match install::apply(&extracted, image_dir, exe_path) {
            Ok(report) => match &report.binary {
                BinaryUpdate::Failed(reason) => {
                    let error = UpdateError::BinaryReplace(reason.clone());
                    self.phase = UpdatePhase::Failed;
                    UpdateNotice::PartiallyInstalled {
                        assets_updated: report.assets_updated,
                        error,
                    }
                }
                binary => {
                    self.phase = UpdatePhase::Completed;
                    UpdateNotice::Installed {
                        assets_updated: report.assets_updated,
                        binary_replaced: matches!(binary, BinaryUpdate::Replaced),
                    }
                }
            },
            Err(error) => {
                self.phase = UpdatePhase::Failed;
                UpdateNotice::InstallFailed(error)
            }
        };
        self.release_download();
        self.manifest = None;
        notice
    }

    fn release_download(&mut self) {
        self.worker = None;
        self.cancel = None;
        // Dropping the scratch dir removes the downloaded archive
        self.download_dir = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use std::sync::mpsc;

    fn sample_manifest(archive_url: &str) -> UpdateManifest {
        UpdateManifest {
            version: "9.0.0".to_string(),
            changelog: "Fresh portraits".to_string(),
            archive_url: archive_url.to_string(),
        }
    }

    fn offered(coordinator: &mut UpdateCoordinator, dir: &Path, exe: &Path, url: &str) {
        let event = UpdateEvent::Checked(Ok(CheckOutcome::UpdateAvailable(sample_manifest(url))));
        coordinator.handle_event(event, dir, exe);
        assert_eq!(coordinator.phase(), UpdatePhase::UpdateAvailable);
    }

    fn build_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_check_while_checking_is_busy() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/release.json")
            .with_body(r#"{"version": "0.1.0", "archive_url": "https://example.com/r.zip"}"#)
            .create();

        let (tx, rx) = mpsc::channel();
        let mut coordinator = UpdateCoordinator::new("1.2.0", tx)
            .with_manifest_url(format!("{}/release.json", server.url()));

        coordinator.begin_check(true).unwrap();
        assert!(matches!(
            coordinator.begin_check(true),
            Err(UpdateError::Busy)
        ));

        let dir = tempfile::tempdir().unwrap();
        let event = rx.recv().unwrap();
        coordinator.handle_event(event, dir.path(), &dir.path().join("bin"));
        assert_eq!(coordinator.phase(), UpdatePhase::UpToDate);
    }

    #[test]
    fn test_available_offer_is_recorded() {
        let (tx, _rx) = mpsc::channel();
        let mut coordinator = UpdateCoordinator::new("1.2.0", tx);
        let dir = tempfile::tempdir().unwrap();

        offered(
            &mut coordinator,
            dir.path(),
            &dir.path().join("bin"),
            "https://example.com/r.zip",
        );
        assert_eq!(coordinator.pending_manifest().unwrap().version, "9.0.0");
    }

    #[test]
    fn test_dismiss_clears_the_offer() {
        let (tx, _rx) = mpsc::channel();
        let mut coordinator = UpdateCoordinator::new("1.2.0", tx);
        let dir = tempfile::tempdir().unwrap();
        offered(
            &mut coordinator,
            dir.path(),
            &dir.path().join("bin"),
            "https://example.com/r.zip",
        );

        assert!(coordinator.dismiss());
        assert_eq!(coordinator.phase(), UpdatePhase::Idle);
        assert!(matches!(
            coordinator.begin_download(),
            Err(UpdateError::Manifest(_))
        ));
    }

    #[test]
    fn test_download_without_offer_is_rejected() {
        let (tx, _rx) = mpsc::channel();
        let mut coordinator = UpdateCoordinator::new("1.2.0", tx);
        assert!(matches!(
            coordinator.begin_download(),
            Err(UpdateError::Manifest(_))
        ));
    }

    #[test]
    fn test_cancel_event_returns_to_idle() {
        let (tx, _rx) = mpsc::channel();
        let mut coordinator = UpdateCoordinator::new("1.2.0", tx);
        let dir = tempfile::tempdir().unwrap();
        offered(
            &mut coordinator,
            dir.path(),
            &dir.path().join("bin"),
            "https://example.com/r.zip",
        );

        let notice =
            coordinator.handle_event(UpdateEvent::Cancelled, dir.path(), &dir.path().join("bin"));
        assert!(matches!(notice, UpdateNotice::Cancelled));
        assert_eq!(coordinator.phase(), UpdatePhase::Idle);
        assert!(coordinator.pending_manifest().is_none());
    }

    #[test]
    fn test_full_pipeline_installs_update() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("release.zip");
        build_archive(
            &archive,
            &[
                ("images/The Trapper.png", b"updated portrait".as_slice()),
                ("tracker-bin", b"new binary".as_slice()),
            ],
        );

        let mut server = mockito::Server::new();
        let archive_url = format!("{}/release.zip", server.url());
        let manifest_body = format!(
            r#"{{"version": "9.9.9", "changelog": "big", "archive_url": "{archive_url}"}}"#
        );
        let _manifest_mock = server
            .mock("GET", "/release.json")
            .with_body(manifest_body)
            .create();
        let _archive_mock = server
            .mock("GET", "/release.zip")
            .with_body(fs::read(&archive).unwrap())
            .create();

        let image_dir = dir.path().join("images");
        fs::create_dir_all(&image_dir).unwrap();
        let exe_path = dir.path().join("tracker-bin");
        fs::write(&exe_path, b"old binary").unwrap();

        let (tx, rx) = mpsc::channel();
        let mut coordinator = UpdateCoordinator::new("1.2.0", tx)
            .with_manifest_url(format!("{}/release.json", server.url()));

        coordinator.begin_check(true).unwrap();
        let event = rx.recv().unwrap();
        let notice = coordinator.handle_event(event, &image_dir, &exe_path);
        assert!(matches!(notice, UpdateNotice::Available { .. }));

        coordinator.begin_download().unwrap();
        let (assets_updated, binary_replaced) = loop {
            let event = rx.recv().unwrap();
            match coordinator.handle_event(event, &image_dir, &exe_path) {
                UpdateNotice::Installed {
                    assets_updated,
                    binary_replaced,
                } => break (assets_updated, binary_replaced),
                UpdateNotice::Progress { .. } => continue,
                other => panic!("unexpected notice: {other:?}"),
            }
        };

        assert_eq!(coordinator.phase(), UpdatePhase::Completed);
        assert_eq!(assets_updated, 1);
        assert!(binary_replaced);
        assert_eq!(
            fs::read(image_dir.join("The Trapper.png")).unwrap(),
            b"updated portrait"
        );
        assert_eq!(fs::read(&exe_path).unwrap(), b"new binary");
    }

    #[test]
    fn test_failed_download_leaves_assets_untouched() {
        let mut server = mockito::Server::new();
        let _archive_mock = server
            .mock("GET", "/release.zip")
            .with_status(500)
            .create();

        let dir = tempfile::tempdir().unwrap();
        let image_dir = dir.path().join("images");
        fs::create_dir_all(&image_dir).unwrap();
        fs::write(image_dir.join("keep.png"), b"keep").unwrap();
        let exe_path = dir.path().join("tracker-bin");
        fs::write(&exe_path, b"old binary").unwrap();

        let (tx, rx) = mpsc::channel();
        let mut coordinator = UpdateCoordinator::new("1.2.0", tx);
        offered(
            &mut coordinator,
            &image_dir,
            &exe_path,
            &format!("{}/release.zip", server.url()),
        );

        coordinator.begin_download().unwrap();
        let event = rx.recv().unwrap();
        let notice = coordinator.handle_event(event, &image_dir, &exe_path);

        assert!(matches!(notice, UpdateNotice::DownloadFailed(_)));
        assert_eq!(coordinator.phase(), UpdatePhase::Failed);
        assert_eq!(fs::read(image_dir.join("keep.png")).unwrap(), b"keep");
        assert_eq!(fs::read(&exe_path).unwrap(), b"old binary");
    }

    #[test]
    fn test_corrupt_download_fails_installation() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.zip");
        fs::write(&bogus, b"not an archive").unwrap();
        let image_dir = dir.path().join("images");
        fs::create_dir_all(&image_dir).unwrap();
        let exe_path = dir.path().join("tracker-bin");
        fs::write(&exe_path, b"old binary").unwrap();

        let (tx, _rx) = mpsc::channel();
        let mut coordinator = UpdateCoordinator::new("1.2.0", tx);
        let notice =
            coordinator.handle_event(UpdateEvent::Downloaded(bogus), &image_dir, &exe_path);

        assert!(matches!(
            notice,
            UpdateNotice::InstallFailed(UpdateError::Archive(_))
        ));
        assert_eq!(coordinator.phase(), UpdatePhase::Failed);
        assert_eq!(fs::read(&exe_path).unwrap(), b"old binary");
    }

    #[test]
    fn test_assets_only_archive_completes_without_binary() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("release.zip");
        build_archive(&archive, &[("images/The Nurse.png", b"portrait".as_slice())]);
        let image_dir = dir.path().join("images");
        fs::create_dir_all(&image_dir).unwrap();
        let exe_path = dir.path().join("tracker-bin");
        fs::write(&exe_path, b"old binary").unwrap();

        let (tx, _rx) = mpsc::channel();
        let mut coordinator = UpdateCoordinator::new("1.2.0", tx);
        let notice =
            coordinator.handle_event(UpdateEvent::Downloaded(archive), &image_dir, &exe_path);

        match notice {
            UpdateNotice::Installed {
                assets_updated,
                binary_replaced,
            } => {
                assert_eq!(assets_updated, 1);
                assert!(!binary_replaced);
            }
            other => panic!("unexpected notice: {other:?}"),
        }
        assert_eq!(coordinator.phase(), UpdatePhase::Completed);
        assert_eq!(fs::read(&exe_path).unwrap(), b"old binary");
    }

    #[test]
    fn test_blocked_binary_swap_is_reported_as_partial() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("release.zip");
        build_archive(
            &archive,
            &[
                ("images/The Wraith.png", b"portrait".as_slice()),
                ("tracker-bin", b"new binary".as_slice()),
            ],
        );
        let image_dir = dir.path().join("images");
        fs::create_dir_all(&image_dir).unwrap();
        let exe_path = dir.path().join("tracker-bin");
        fs::write(&exe_path, b"old binary").unwrap();
        fs::create_dir_all(dir.path().join("tracker-bin.old/occupied")).unwrap();

        let (tx, _rx) = mpsc::channel();
        let mut coordinator = UpdateCoordinator::new("1.2.0", tx);
        let notice =
            coordinator.handle_event(UpdateEvent::Downloaded(archive), &image_dir, &exe_path);

        match notice {
            UpdateNotice::PartiallyInstalled {
                assets_updated,
                error: UpdateError::BinaryReplace(_),
            } => assert_eq!(assets_updated, 1),
            other => panic!("unexpected notice: {other:?}"),
        }
        assert_eq!(coordinator.phase(), UpdatePhase::Failed);
        assert_eq!(
            fs::read(image_dir.join("The Wraith.png")).unwrap(),
            b"portrait"
        );
    }
}
