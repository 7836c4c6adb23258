//! Planning and execution of podcast downloads
//!
//! The planner maps a calendar date to the canonical destination file, which
//! doubles as the de-duplication mechanism: two candidates with the same date
//! collapse onto the same path, and only the first is fetched. The fetcher
//! retrieves the audio, publishes it atomically via a sibling `.part` file,
//! and optionally hands ownership to a configured user for cron deployments.

use chrono::NaiveDate;
use log::{error, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching or storing an episode.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The audio resource could not be retrieved
    #[error("failed to retrieve audio: {0}")]
    Transfer(#[from] reqwest::Error),

    /// The audio request returned a non-success status
    #[error("audio request failed with HTTP {status}")]
    HttpStatus { status: u16 },

    /// The audio could not be written to disk
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    /// The configured owner does not name a known user or group
    #[error("unknown user or group: {0}")]
    UnknownOwner(String),

    /// Changing the file's ownership failed
    #[error("failed to change ownership of {path}: {reason}")]
    OwnershipChange { path: PathBuf, reason: String },
}

/// The canonical destination for an episode of a given date.
///
/// The filename is a pure function of the date; the embedded weekday is
/// always derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationRecord {
    /// Canonical filename for the date
    pub filename: String,
    /// Absolute destination path under the run's base directory
    pub path: PathBuf,
    /// Whether a regular file is already present at the path
    pub exists: bool,
}

/// Computes the destination record for an episode dated `date`.
///
/// No side effects beyond reading filesystem metadata.
pub fn plan(base_dir: &Path, date: NaiveDate) -> DestinationRecord {
    // Weekday in the name is for readability when browsing the archive
    let weekday = date.format("%A").to_string().to_lowercase();
    let filename = format!(
        "{}-{}-the-church-of-lazlo-podcast.mp3",
        date.format("%Y%m%d"),
        weekday
    );
    let path = base_dir.join(&filename);
    let exists = path.is_file();
    DestinationRecord { filename, path, exists }
}

/// Trait for sources that can retrieve episode audio.
pub trait AudioProvider {
    /// Retrieves the full audio resource at `url`.
    fn fetch_audio(&self, url: &str) -> Result<Vec<u8>, DeliveryError>;
}

/// Audio provider backed by a blocking HTTP client.
pub struct HttpAudioProvider {
    client: reqwest::blocking::Client,
}

impl HttpAudioProvider {
    /// Creates a new HTTP audio provider.
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent(crate::USER_AGENT)
            // Full shows run to a few hundred MB on slow days
            .timeout(Duration::from_secs(600))
            .build()
            .expect("failed to create HTTP client");
        Self { client }
    }
}

impl Default for HttpAudioProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioProvider for HttpAudioProvider {
    fn fetch_audio(&self, url: &str) -> Result<Vec<u8>, DeliveryError> {
        info!("fetching audio from {url}");
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(DeliveryError::HttpStatus {
                status: response.status().as_u16(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// How a fetch request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The episode was downloaded and written to its canonical path
    Saved,
    /// A file already existed at the canonical path; nothing was fetched
    AlreadyArchived,
}

/// Removes the in-progress `.part` file on drop. Once the final file has
/// been published with a rename the removal quietly finds nothing.
struct PartGuard(PathBuf);

impl Drop for PartGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

/// Fetches the resource at `url` and stores it at the planned destination.
///
/// Returns [`StoreOutcome::AlreadyArchived`] without touching the network
/// when the destination already exists, making repeated runs idempotent.
/// Otherwise the full body is retrieved first and written to a sibling
/// `.part` file that is renamed onto the canonical path, so a failed
/// transfer never leaves a partial file at the canonical name.
///
/// When `owner` is set the saved file is chowned to that user and group; a
/// failure there is logged but does not invalidate the download.
pub fn fetch_and_store(
    provider: &dyn AudioProvider,
    url: &str,
    destination: &DestinationRecord,
    owner: Option<&str>,
) -> Result<StoreOutcome, DeliveryError> {
    if destination.exists {
        info!("file {} already exists", destination.path.display());
        return Ok(StoreOutcome::AlreadyArchived);
    }

    info!("downloading {}", destination.filename);
    let audio = provider.fetch_audio(url)?;

    info!("saving file");
    let part_path = destination.path.with_extension("mp3.part");
    let _guard = PartGuard(part_path.clone());
    fs::write(&part_path, &audio).map_err(|source| DeliveryError::Write {
        path: part_path.clone(),
        source,
    })?;
    fs::rename(&part_path, &destination.path).map_err(|source| DeliveryError::Write {
        path: destination.path.clone(),
        source,
    })?;

    info!("podcast saved to destination");

    if let Some(owner) = owner {
        info!("changing owner of {} to {owner}", destination.filename);
        if let Err(err) = apply_owner(&destination.path, owner) {
            // The download is the primary success condition; keep the file
            error!("{err}");
        }
    }

    Ok(StoreOutcome::Saved)
}

#[cfg(unix)]
fn apply_owner(path: &Path, owner: &str) -> Result<(), DeliveryError> {
    use nix::unistd::{Group, User, chown};

    let ownership_error = |reason: String| DeliveryError::OwnershipChange {
        path: path.to_path_buf(),
        reason,
    };

    let user = User::from_name(owner)
        .map_err(|err| ownership_error(err.to_string()))?
        .ok_or_else(|| DeliveryError::UnknownOwner(owner.to_string()))?;
    let group = Group::from_name(owner)
        .map_err(|err| ownership_error(err.to_string()))?
        .ok_or_else(|| DeliveryError::UnknownOwner(owner.to_string()))?;

    chown(path, Some(user.uid), Some(group.gid)).map_err(|err| ownership_error(err.to_string()))
}

#[cfg(not(unix))]
fn apply_owner(path: &Path, _owner: &str) -> Result<(), DeliveryError> {
    Err(DeliveryError::OwnershipChange {
        path: path.to_path_buf(),
        reason: "ownership changes are only supported on unix".to_string(),
    })
}
