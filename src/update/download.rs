//! Background transfer of the release archive
//!
//! Worker threads for the two network stages: the manifest check and the
//! archive download. Both report back over the session channel and never
//! touch the profile document or the output tree; installation stays on
//! the shell thread.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::manifest::{self, VersionOrdering};
use super::{CheckOutcome, UpdateError, UpdateEvent};
use crate::constants::update;

/// Inputs for a manifest check worker.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub url: String,
    pub current_version: String,
    pub ordering: VersionOrdering,
}

/// Spawns the manifest check. The result arrives as a `Checked` event.
pub fn spawn_check(request: CheckRequest, events: Sender<UpdateEvent>) -> JoinHandle<()> {
    thread::spawn(move || {
        let outcome = run_check(&request);
        // Receiver gone means the session is shutting down
        let _ = events.send(UpdateEvent::Checked(outcome));
    })
}

fn run_check(request: &CheckRequest) -> Result<CheckOutcome, UpdateError> {
    let manifest = manifest::fetch_manifest(
        &request.url,
        Duration::from_secs(update::CHECK_TIMEOUT_SECS),
    )?;
    debug!(
        remote = %manifest.version,
        current = %request.current_version,
        "manifest fetched"
    );
    if request
        .ordering
        .is_newer(&manifest.version, &request.current_version)
    {
        Ok(CheckOutcome::UpdateAvailable(manifest))
    } else {
        Ok(CheckOutcome::UpToDate {
            current: request.current_version.clone(),
            remote: manifest.version,
        })
    }
}

/// Spawns the archive download. Progress, completion and failure all arrive
/// as events; a cancelled or failed transfer removes the partial file.
pub fn spawn_download(
    url: String,
    dest: PathBuf,
    events: Sender<UpdateEvent>,
    cancel: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || match run_download(&url, &dest, &events, &cancel) {
        Ok(true) => {
            info!(archive = %dest.display(), "download complete");
            let _ = events.send(UpdateEvent::Downloaded(dest));
        }
        Ok(false) => {
            remove_partial(&dest);
            let _ = events.send(UpdateEvent::Cancelled);
        }
        Err(err) => {
            remove_partial(&dest);
            let _ = events.send(UpdateEvent::DownloadFailed(err));
        }
    })
}

fn run_download(
    url: &str,
    dest: &Path,
    events: &Sender<UpdateEvent>,
    cancel: &AtomicBool,
) -> Result<bool, UpdateError> {
    let client = reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(update::CONNECT_TIMEOUT_SECS))
        .timeout(None)
        .build()
        .map_err(|err| UpdateError::Network(err.to_string()))?;
    let mut response = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .map_err(|err| UpdateError::Network(err.to_string()))?;

    let total = response.content_length();
    let mut file = File::create(dest).map_err(|err| UpdateError::Io(err.to_string()))?;
    let mut buffer = vec![0u8; update::CHUNK_SIZE];
    let mut received: u64 = 0;

    loop {
        // Checked between chunks, so a cancel takes effect within one read
        if cancel.load(Ordering::Relaxed) {
            info!(received, "download cancelled");
            return Ok(false);
        }
        let read = response
            .read(&mut buffer)
            .map_err(|err| UpdateError::Network(err.to_string()))?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .map_err(|err| UpdateError::Io(err.to_string()))?;
        received += read as u64;
        let percent = total
            .filter(|total| *total > 0)
            .map(|total| ((received.min(total) * 100) / total) as u8);
        let _ = events.send(UpdateEvent::Progress {
            received,
            total,
            percent,
        });
    }
    Ok(true)
}

fn remove_partial(dest: &Path) {
    if dest.exists()
        && let Err(err) = std::fs::remove_file(dest)
    {
        warn!(path = %dest.display(), error = %err, "failed to remove partial download");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn check_request(url: String, current: &str) -> CheckRequest {
        CheckRequest {
            url,
            current_version: current.to_string(),
            ordering: VersionOrdering::Numeric,
        }
    }

    #[test]
    fn test_check_reports_update_available() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/release.json")
            .with_body(r#"{"version": "2.0.0", "archive_url": "https://example.com/r.zip"}"#)
            .create();

        let (tx, rx) = mpsc::channel();
        let handle = spawn_check(check_request(format!("{}/release.json", server.url()), "1.2.0"), tx);
        handle.join().unwrap();

        match rx.recv().unwrap() {
            UpdateEvent::Checked(Ok(CheckOutcome::UpdateAvailable(manifest))) => {
                assert_eq!(manifest.version, "2.0.0");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_check_reports_up_to_date_for_older_remote() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/release.json")
            .with_body(r#"{"version": "1.0.0", "archive_url": "https://example.com/r.zip"}"#)
            .create();

        let (tx, rx) = mpsc::channel();
        let handle = spawn_check(check_request(format!("{}/release.json", server.url()), "1.2.0"), tx);
        handle.join().unwrap();

        match rx.recv().unwrap() {
            UpdateEvent::Checked(Ok(CheckOutcome::UpToDate { current, remote })) => {
                assert_eq!(current, "1.2.0");
                assert_eq!(remote, "1.0.0");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_check_surfaces_network_failure() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/release.json").with_status(500).create();

        let (tx, rx) = mpsc::channel();
        let handle = spawn_check(check_request(format!("{}/release.json", server.url()), "1.2.0"), tx);
        handle.join().unwrap();

        match rx.recv().unwrap() {
            UpdateEvent::Checked(Err(UpdateError::Network(_))) => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_download_streams_and_reports_progress() {
        let mut server = mockito::Server::new();
        let body = vec![7u8; 200_000];
        let _mock = server.mock("GET", "/release.zip").with_body(body).create();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("release.zip");
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));

        let handle = spawn_download(
            format!("{}/release.zip", server.url()),
            dest.clone(),
            tx,
            cancel,
        );
        handle.join().unwrap();

        let mut last_percent = None;
        let mut downloaded = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                UpdateEvent::Progress { percent, .. } => {
                    assert!(percent >= last_percent);
                    last_percent = percent;
                }
                UpdateEvent::Downloaded(path) => {
                    assert_eq!(path, dest);
                    downloaded = true;
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(downloaded);
        assert_eq!(last_percent, Some(100));
        assert_eq!(std::fs::read(&dest).unwrap().len(), 200_000);
    }

    #[test]
    fn test_failed_download_leaves_no_partial_file() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/release.zip").with_status(500).create();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("release.zip");
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));

        let handle = spawn_download(
            format!("{}/release.zip", server.url()),
            dest.clone(),
            tx,
            cancel,
        );
        handle.join().unwrap();

        match rx.recv().unwrap() {
            UpdateEvent::DownloadFailed(UpdateError::Network(_)) => {}
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!dest.exists());
    }

    #[test]
    fn test_cancelled_download_cleans_up() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/release.zip")
            .with_body(vec![1u8; 100_000])
            .create();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("release.zip");
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(true));

        let handle = spawn_download(
            format!("{}/release.zip", server.url()),
            dest.clone(),
            tx,
            cancel,
        );
        handle.join().unwrap();

        match rx.recv().unwrap() {
            UpdateEvent::Cancelled => {}
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!dest.exists());
    }
}
