//! Diagnostics side channel for the discovery pipeline.
//!
//! Scraping and scoring failures never surface as errors; they degrade to
//! fewer results. Each component reports what happened through a
//! [`DiscoveryObserver`] handed to it at construction, so callers and tests
//! can tell "the query matched nothing" from "the page never loaded".

use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeEvent {
    /// The browser session could not be opened.
    SessionFailed { error: String },
    NavigationFailed { url: String, error: String },
    /// The results list never rendered within the timeout.
    ResultsMissing { query: String, error: String },
    /// The results list rendered but no card could be read back.
    NoCards { query: String },
    /// The driver failed mid-query for a reason other than a timeout.
    DriverFailed { query: String, error: String },
    CardsFound { query: String, count: usize },
    CardSkipped { query: String, index: usize, reason: String },
    DiagnosticSaved { path: PathBuf },
    DiagnosticFailed { error: String },
    SessionCloseFailed { error: String },
    QueryEmpty { query: String },
    ListingsPersisted { query: String, new: usize, inserted: usize },
    DescriptionScraped { job_id: String, chars: usize },
    DescriptionMissing { job_id: String },
    DescriptionFailed { job_id: String, error: String },
    ScoreBatchFailed { batch: usize, error: String },
    ScoreDropped { job_id: String, reason: String },
}

pub trait DiscoveryObserver: Send + Sync {
    fn record(&self, event: ScrapeEvent);
}

/// Forwards every event to `tracing` at a level matching its severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DiscoveryObserver for TracingObserver {
    fn record(&self, event: ScrapeEvent) {
        match event {
            ScrapeEvent::SessionFailed { error } => {
                warn!(%error, "browser session failed to start");
            }
            ScrapeEvent::NavigationFailed { url, error } => {
                warn!(%url, %error, "navigation failed");
            }
            ScrapeEvent::ResultsMissing { query, error } => {
                warn!(%query, %error, "results list did not render");
            }
            ScrapeEvent::NoCards { query } => {
                warn!(%query, "results page had no job cards");
            }
            ScrapeEvent::DriverFailed { query, error } => {
                warn!(%query, %error, "webdriver call failed");
            }
            ScrapeEvent::CardsFound { query, count } => {
                info!(%query, count, "found job cards");
            }
            ScrapeEvent::CardSkipped { query, index, reason } => {
                debug!(%query, index, %reason, "skipped job card");
            }
            ScrapeEvent::DiagnosticSaved { path } => {
                info!(path = %path.display(), "saved page screenshot");
            }
            ScrapeEvent::DiagnosticFailed { error } => {
                warn!(%error, "could not save page screenshot");
            }
            ScrapeEvent::SessionCloseFailed { error } => {
                warn!(%error, "browser session did not close cleanly");
            }
            ScrapeEvent::QueryEmpty { query } => {
                info!(%query, "query returned no listings");
            }
            ScrapeEvent::ListingsPersisted { query, new, inserted } => {
                info!(%query, new, inserted, "persisted new listings");
            }
            ScrapeEvent::DescriptionScraped { job_id, chars } => {
                debug!(%job_id, chars, "scraped description");
            }
            ScrapeEvent::DescriptionMissing { job_id } => {
                warn!(%job_id, "no description found");
            }
            ScrapeEvent::DescriptionFailed { job_id, error } => {
                warn!(%job_id, %error, "description scrape failed");
            }
            ScrapeEvent::ScoreBatchFailed { batch, error } => {
                warn!(batch, %error, "scoring batch failed");
            }
            ScrapeEvent::ScoreDropped { job_id, reason } => {
                warn!(%job_id, %reason, "dropped score");
            }
        }
    }
}

/// Keeps events in memory, in arrival order.
pub struct RecordingObserver {
    events: Mutex<Vec<ScrapeEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<ScrapeEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, matches: impl Fn(&ScrapeEvent) -> bool) -> usize {
        self.events().iter().filter(|e| matches(e)).count()
    }
}

impl Default for RecordingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryObserver for RecordingObserver {
    fn record(&self, event: ScrapeEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
