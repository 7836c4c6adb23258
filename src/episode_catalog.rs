//! Episode catalog reading
//!
//! Retrieves the episode listing page and extracts download candidates from
//! its markup. Each episode is a list item carrying a download link and a
//! title link; entries missing either part are not downloadable and are
//! excluded without comment.

use log::{debug, info};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

static ITEM_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("li.podcast-episode-list__item").expect("selector is valid")
});
static DOWNLOAD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a.podcast-episode-list__download-link").expect("selector is valid")
});
static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a.podcast-episode-list__title").expect("selector is valid")
});

/// Errors that can occur while retrieving the listing page.
///
/// These are fatal to a run: without the catalog there is nothing to do.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The listing page could not be retrieved
    #[error("failed to retrieve listing page: {0}")]
    Request(#[from] reqwest::Error),

    /// The listing page request returned a non-success status
    #[error("listing page request failed with HTTP {status}")]
    HttpStatus { status: u16 },
}

/// A downloadable entry found on the listing page.
///
/// Produced fresh per run; whether it is a full show is decided later from
/// its title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeCandidate {
    /// The episode title as shown on the listing
    pub title: String,
    /// Target of the episode's download link
    pub download_url: String,
}

/// Trait for sources that can retrieve the raw listing page markup.
///
/// Seams the network transport from candidate extraction so the pipeline can
/// be exercised against canned markup in tests.
pub trait ListingProvider {
    /// Retrieves the listing page at `url` and returns its body.
    fn fetch_listing(&self, url: &str) -> Result<String, CatalogError>;
}

/// Listing provider backed by a blocking HTTP client.
pub struct HttpListingProvider {
    client: reqwest::blocking::Client,
}

impl HttpListingProvider {
    /// Creates a new HTTP listing provider.
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to create HTTP client");
        Self { client }
    }
}

impl Default for HttpListingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingProvider for HttpListingProvider {
    fn fetch_listing(&self, url: &str) -> Result<String, CatalogError> {
        info!("fetching listing page {url}");
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(CatalogError::HttpStatus {
                status: response.status().as_u16(),
            });
        }
        Ok(response.text()?)
    }
}

/// Lazily extracts episode candidates from a parsed listing document.
///
/// The sequence is finite and restartable only by re-parsing the document.
pub fn list_candidates(document: &Html) -> impl Iterator<Item = EpisodeCandidate> + '_ {
    document.select(&ITEM_SELECTOR).filter_map(candidate_from_item)
}

fn candidate_from_item(item: ElementRef<'_>) -> Option<EpisodeCandidate> {
    let download_url = item
        .select(&DOWNLOAD_SELECTOR)
        .next()?
        .value()
        .attr("href")?
        .to_string();

    let title = item
        .select(&TITLE_SELECTOR)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    if title.is_empty() {
        return None;
    }

    debug!("extracted candidate \"{title}\" -> {download_url}");
    Some(EpisodeCandidate { title, download_url })
}
