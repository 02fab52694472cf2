//! Release manifest retrieval and version ordering.

use std::cmp::Ordering;
use std::time::Duration;

use serde::Deserialize;

use super::UpdateError;

/// Remote description of the latest release.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateManifest {
    pub version: String,
    #[serde(default)]
    pub changelog: String,
    pub archive_url: String,
}

/// How two version strings rank against each other.
///
/// `Numeric` splits on dots and compares segment-wise as integers, so
/// "1.10.0" ranks above "1.9.0". `Lexicographic` is the plain string
/// ordering earlier releases shipped with; it survives for anyone pinning
/// the old behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VersionOrdering {
    #[default]
    Numeric,
    Lexicographic,
}

impl VersionOrdering {
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match self {
            VersionOrdering::Numeric => numeric_compare(a, b),
            VersionOrdering::Lexicographic => a.cmp(b),
        }
    }

    /// True when the remote version ranks strictly above the current one.
    pub fn is_newer(&self, remote: &str, current: &str) -> bool {
        self.compare(remote, current) == Ordering::Greater
    }
}

fn numeric_compare(a: &str, b: &str) -> Ordering {
    let a = normalize(a);
    let b = normalize(b);
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (l, r) => {
                let l = l.unwrap_or("0");
                let r = r.unwrap_or("0");
                let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    // Non-numeric segments fall back to string order
                    _ => l.cmp(r),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

fn normalize(version: &str) -> &str {
    version.trim().trim_start_matches(['v', 'V'])
}

/// Fetches and parses the release manifest.
pub fn fetch_manifest(url: &str, timeout: Duration) -> Result<UpdateManifest, UpdateError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| UpdateError::Network(err.to_string()))?;
    let response = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .map_err(|err| UpdateError::Network(err.to_string()))?;
    response.json().map_err(|err| {
        if err.is_decode() {
            UpdateError::Manifest(err.to_string())
        } else {
            UpdateError::Network(err.to_string())
        }
    })
}
