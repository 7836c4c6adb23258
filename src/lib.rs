//! lazlo-archiver - Archive full-show episodes of The Church of Lazlo podcast
//!
//! The show's listing page mixes full-show releases with short clips and
//! bonus segments. Full shows carry a readable calendar date in their title,
//! so this library extracts download candidates from the listing, decides
//! which titles genuinely encode a date, and downloads each qualifying
//! episode to a canonical per-date filename exactly once, no matter how
//! often a run repeats.
//!
//! Runs are strictly sequential and uncoordinated between processes; point
//! only one invocation at a given base directory at a time.

mod date_signal;
mod episode_catalog;
mod podcast_delivery;

pub use date_signal::{extract_date, extract_date_at};
pub use episode_catalog::{
    CatalogError, EpisodeCandidate, HttpListingProvider, ListingProvider, list_candidates,
};
pub use podcast_delivery::{
    AudioProvider, DeliveryError, DestinationRecord, HttpAudioProvider, StoreOutcome,
    fetch_and_store, plan,
};

use chrono::{Local, NaiveDate};
use log::{error, info};
use scraper::Html;
use std::path::PathBuf;

/// Listing page the archiver inspects by default.
pub const DEFAULT_LISTING_URL: &str =
    "https://www.audacy.com/alt965kc/podcasts/church-of-lazlo-podcasts-20110";

pub(crate) const USER_AGENT: &str = concat!("lazlo-archiver/", env!("CARGO_PKG_VERSION"));

/// Configuration for a single archive run.
///
/// Built by the caller and passed in explicitly, so isolated or repeated
/// runs never share state.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// The listing page to inspect
    pub listing_url: String,
    /// Directory the episodes are written to
    pub base_path: PathBuf,
    /// User (and group) that should own newly written files, if any
    pub owner: Option<String>,
    /// Anchor for completing partial date fragments found in titles
    pub today: NaiveDate,
}

impl RunConfig {
    /// Creates a run configuration with no owner adjustment, anchored at the
    /// current local date.
    pub fn new(listing_url: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            listing_url: listing_url.into(),
            base_path: base_path.into(),
            owner: None,
            today: Local::now().date_naive(),
        }
    }
}

/// Outcome of processing a single catalog entry.
///
/// Per-candidate failures are contained here rather than raised, so one bad
/// entry never aborts the run.
#[derive(Debug)]
pub enum CandidateOutcome {
    /// The episode was downloaded to its canonical path
    Downloaded { title: String, path: PathBuf },
    /// A file for the episode's date already existed; nothing was fetched
    AlreadyArchived { title: String, path: PathBuf },
    /// The title carries no recognizable date; not a full show
    NoDate { title: String },
    /// Fetching or storing the episode failed
    Failed { title: String, error: DeliveryError },
}

/// Aggregated outcomes of one archive run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// One outcome per processed candidate, in listing order
    pub outcomes: Vec<CandidateOutcome>,
}

impl RunReport {
    /// Number of episodes downloaded in this run.
    pub fn downloaded(&self) -> usize {
        self.count(|outcome| matches!(outcome, CandidateOutcome::Downloaded { .. }))
    }

    /// Number of candidates skipped because their file already existed.
    pub fn already_archived(&self) -> usize {
        self.count(|outcome| matches!(outcome, CandidateOutcome::AlreadyArchived { .. }))
    }

    /// Number of candidates without an extractable date.
    pub fn without_date(&self) -> usize {
        self.count(|outcome| matches!(outcome, CandidateOutcome::NoDate { .. }))
    }

    /// Number of candidates that failed to download or store.
    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, CandidateOutcome::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&CandidateOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|outcome| predicate(outcome)).count()
    }
}

/// Runs the archive pipeline once.
///
/// Fetches the listing page (a failure here is fatal and returned to the
/// caller), extracts candidates, and processes them one at a time: date
/// extraction, destination planning, idempotent fetch. Every candidate
/// yields an entry in the returned [`RunReport`]; failures after the catalog
/// stage are captured there and logged, never raised.
pub fn run_archive(
    config: &RunConfig,
    listing: &dyn ListingProvider,
    audio: &dyn AudioProvider,
) -> Result<RunReport, CatalogError> {
    info!("starting run against {}", config.listing_url);

    let page = listing.fetch_listing(&config.listing_url)?;
    let candidates: Vec<EpisodeCandidate> = {
        let document = Html::parse_document(&page);
        list_candidates(&document).collect()
    };
    info!("found {} list entries", candidates.len());

    let mut report = RunReport::default();
    for candidate in candidates {
        report.outcomes.push(process_candidate(config, audio, candidate));
    }

    info!(
        "done, {} downloaded, {} already archived, {} without date, {} failed",
        report.downloaded(),
        report.already_archived(),
        report.without_date(),
        report.failed()
    );
    Ok(report)
}

fn process_candidate(
    config: &RunConfig,
    audio: &dyn AudioProvider,
    candidate: EpisodeCandidate,
) -> CandidateOutcome {
    info!("found url: {}", candidate.download_url);
    info!("found name: {}", candidate.title);

    let Some(date) = extract_date_at(&candidate.title, config.today) else {
        info!("could not find date in \"{}\"", candidate.title);
        return CandidateOutcome::NoDate { title: candidate.title };
    };
    info!("found date: {date}");

    let destination = plan(&config.base_path, date);
    match fetch_and_store(
        audio,
        &candidate.download_url,
        &destination,
        config.owner.as_deref(),
    ) {
        Ok(StoreOutcome::Saved) => CandidateOutcome::Downloaded {
            title: candidate.title,
            path: destination.path,
        },
        Ok(StoreOutcome::AlreadyArchived) => CandidateOutcome::AlreadyArchived {
            title: candidate.title,
            path: destination.path,
        },
        Err(error) => {
            error!("failed to archive \"{}\": {error}", candidate.title);
            CandidateOutcome::Failed {
                title: candidate.title,
                error,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;

    struct FakeListing(&'static str);

    impl ListingProvider for FakeListing {
        fn fetch_listing(&self, _url: &str) -> Result<String, CatalogError> {
            Ok(self.0.to_string())
        }
    }

    struct FakeAudio {
        failing_url: Option<&'static str>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeAudio {
        fn new() -> Self {
            Self { failing_url: None, calls: RefCell::new(Vec::new()) }
        }

        fn failing_on(url: &'static str) -> Self {
            Self { failing_url: Some(url), calls: RefCell::new(Vec::new()) }
        }
    }

    impl AudioProvider for FakeAudio {
        fn fetch_audio(&self, url: &str) -> Result<Vec<u8>, DeliveryError> {
            self.calls.borrow_mut().push(url.to_string());
            if self.failing_url == Some(url) {
                return Err(DeliveryError::HttpStatus { status: 500 });
            }
            Ok(b"audio-bytes".to_vec())
        }
    }

    fn config_for(dir: &tempfile::TempDir, today: NaiveDate) -> RunConfig {
        let mut config = RunConfig::new("https://example.com/listing", dir.path());
        config.today = today;
        config
    }

    fn march(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    const TWO_ITEM_LISTING: &str = r#"
        <ul>
            <li class="podcast-episode-list__item">
                <a class="podcast-episode-list__title spa-link" href="/ep1">
                    Monday March 4th Church of Lazlo Podcast
                </a>
                <a class="podcast-episode-list__download-link" href="https://cdn.example.com/ep1.mp3">Download</a>
            </li>
            <li class="podcast-episode-list__item">
                <a class="podcast-episode-list__title spa-link" href="/ep2">Bonus Clip</a>
                <a class="podcast-episode-list__download-link" href="https://cdn.example.com/ep2.mp3">Download</a>
            </li>
        </ul>
    "#;

    const THREE_ITEM_LISTING: &str = r#"
        <ul>
            <li class="podcast-episode-list__item">
                <a class="podcast-episode-list__title spa-link" href="/ep1">
                    Monday March 4th Church of Lazlo Podcast
                </a>
                <a class="podcast-episode-list__download-link" href="https://cdn.example.com/ep1.mp3">Download</a>
            </li>
            <li class="podcast-episode-list__item">
                <a class="podcast-episode-list__title spa-link" href="/ep2">
                    Tuesday March 5th Church of Lazlo Podcast
                </a>
                <a class="podcast-episode-list__download-link" href="https://cdn.example.com/ep2.mp3">Download</a>
            </li>
            <li class="podcast-episode-list__item">
                <a class="podcast-episode-list__title spa-link" href="/ep3">
                    Wednesday March 6th Church of Lazlo Podcast
                </a>
                <a class="podcast-episode-list__download-link" href="https://cdn.example.com/ep3.mp3">Download</a>
            </li>
        </ul>
    "#;

    #[test]
    fn test_downloads_only_date_bearing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let listing = FakeListing(TWO_ITEM_LISTING);
        let audio = FakeAudio::new();

        let report = run_archive(&config_for(&dir, march(4)), &listing, &audio).unwrap();

        assert_eq!(report.downloaded(), 1);
        assert_eq!(report.without_date(), 1);
        assert_eq!(report.failed(), 0);

        let expected = dir
            .path()
            .join("20240304-monday-the-church-of-lazlo-podcast.mp3");
        assert_eq!(fs::read(&expected).unwrap(), b"audio-bytes");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(
            *audio.calls.borrow(),
            vec!["https://cdn.example.com/ep1.mp3".to_string()]
        );
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let listing = FakeListing(TWO_ITEM_LISTING);
        let audio = FakeAudio::new();
        let config = config_for(&dir, march(4));

        run_archive(&config, &listing, &audio).unwrap();
        let second = run_archive(&config, &listing, &audio).unwrap();

        assert_eq!(second.downloaded(), 0);
        assert_eq!(second.already_archived(), 1);
        // The audio was fetched during the first run only
        assert_eq!(audio.calls.borrow().len(), 1);
    }

    #[test]
    fn test_one_failing_candidate_does_not_abort_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let listing = FakeListing(THREE_ITEM_LISTING);
        let audio = FakeAudio::failing_on("https://cdn.example.com/ep2.mp3");

        let report = run_archive(&config_for(&dir, march(4)), &listing, &audio).unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert!(matches!(report.outcomes[0], CandidateOutcome::Downloaded { .. }));
        assert!(matches!(report.outcomes[1], CandidateOutcome::Failed { .. }));
        assert!(matches!(report.outcomes[2], CandidateOutcome::Downloaded { .. }));

        assert!(dir
            .path()
            .join("20240304-monday-the-church-of-lazlo-podcast.mp3")
            .is_file());
        assert!(!dir
            .path()
            .join("20240305-tuesday-the-church-of-lazlo-podcast.mp3")
            .exists());
        assert!(dir
            .path()
            .join("20240306-wednesday-the-church-of-lazlo-podcast.mp3")
            .is_file());
    }

    #[test]
    fn test_same_date_candidates_collapse_to_one_download() {
        let dir = tempfile::tempdir().unwrap();
        // Same episode listed twice, e.g. after a feed hiccup
        let listing = FakeListing(
            r#"
            <ul>
                <li class="podcast-episode-list__item">
                    <a class="podcast-episode-list__title spa-link" href="/a">Monday March 4th Church of Lazlo Podcast</a>
                    <a class="podcast-episode-list__download-link" href="https://cdn.example.com/a.mp3">Download</a>
                </li>
                <li class="podcast-episode-list__item">
                    <a class="podcast-episode-list__title spa-link" href="/b">Monday March 4th Church of Lazlo Podcast (repost)</a>
                    <a class="podcast-episode-list__download-link" href="https://cdn.example.com/b.mp3">Download</a>
                </li>
            </ul>
            "#,
        );
        let audio = FakeAudio::new();

        let report = run_archive(&config_for(&dir, march(4)), &listing, &audio).unwrap();

        assert_eq!(report.downloaded(), 1);
        assert_eq!(report.already_archived(), 1);
        assert_eq!(
            *audio.calls.borrow(),
            vec!["https://cdn.example.com/a.mp3".to_string()]
        );
    }

    #[test]
    fn test_catalog_failure_is_fatal() {
        struct DownListing;
        impl ListingProvider for DownListing {
            fn fetch_listing(&self, _url: &str) -> Result<String, CatalogError> {
                Err(CatalogError::HttpStatus { status: 503 })
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let result = run_archive(&config_for(&dir, march(4)), &DownListing, &FakeAudio::new());
        assert!(matches!(result, Err(CatalogError::HttpStatus { status: 503 })));
    }
}
