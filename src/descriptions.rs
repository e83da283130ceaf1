use scraper::Html;
use std::collections::HashMap;
use std::sync::Arc;

use crate::browser::{BrowserError, BrowserLauncher, BrowserSession};
use crate::config::ScraperConfig;
use crate::models::JobListing;
use crate::observe::{DiscoveryObserver, ScrapeEvent};

// Expanders that hide the tail of the description on some layouts.
const SHOW_MORE_SELECTORS: &[&str] = &[
    "button.show-more-less-html__button--more",
    "button[aria-label*='Show more']",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    "div.show-more-less-html__markup",
    "div.description__text",
    "section.show-more-less-html",
    "div.jobs-description__content",
];

pub struct DescriptionFetcher {
    launcher: Arc<dyn BrowserLauncher>,
    config: ScraperConfig,
    observer: Arc<dyn DiscoveryObserver>,
}

impl DescriptionFetcher {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        config: ScraperConfig,
        observer: Arc<dyn DiscoveryObserver>,
    ) -> Self {
        Self {
            launcher,
            config,
            observer,
        }
    }

    /// Visits each listing's page and returns `id -> description` for the
    /// ones that yielded text. Failures drop only the affected listing.
    pub async fn scrape_job_descriptions(
        &self,
        listings: &[JobListing],
    ) -> HashMap<String, String> {
        let mut descriptions = HashMap::new();
        if listings.iter().all(|job| job.job_url.trim().is_empty()) {
            return descriptions;
        }

        let mut session = match self.launcher.open_session().await {
            Ok(session) => session,
            Err(e) => {
                self.observer.record(ScrapeEvent::SessionFailed {
                    error: e.to_string(),
                });
                return descriptions;
            }
        };

        let mut visited = 0;
        for job in listings {
            if job.job_url.trim().is_empty() {
                continue;
            }
            if visited > 0 && !self.config.page_delay.is_zero() {
                tokio::time::sleep(self.config.page_delay).await;
            }
            visited += 1;

            match self.fetch_one(session.as_mut(), &job.job_url).await {
                Ok(Some(text)) => {
                    self.observer.record(ScrapeEvent::DescriptionScraped {
                        job_id: job.id.clone(),
                        chars: text.chars().count(),
                    });
                    descriptions.insert(job.id.clone(), text);
                }
                Ok(None) => self.observer.record(ScrapeEvent::DescriptionMissing {
                    job_id: job.id.clone(),
                }),
                Err(e) => self.observer.record(ScrapeEvent::DescriptionFailed {
                    job_id: job.id.clone(),
                    error: e.to_string(),
                }),
            }
        }

        if let Err(e) = session.close().await {
            self.observer.record(ScrapeEvent::SessionCloseFailed {
                error: e.to_string(),
            });
        }
        descriptions
    }

    async fn fetch_one(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
    ) -> Result<Option<String>, BrowserError> {
        session
            .navigate(url, self.config.navigation_timeout)
            .await?;
        if !self.config.page_settle.is_zero() {
            tokio::time::sleep(self.config.page_settle).await;
        }

        for selector in SHOW_MORE_SELECTORS {
            if let Ok(true) = session
                .click_if_visible(selector, std::time::Duration::ZERO)
                .await
            {
                break;
            }
        }

        for selector in DESCRIPTION_SELECTORS {
            // A selector that errors is just a strategy that did not match.
            let Ok(matches) = session.query_all(selector).await else {
                continue;
            };
            if let Some(text) = matches.first().and_then(|html| html_to_text(html)) {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }
}

/// Flattens an element's HTML to text, one line per block of text.
pub fn html_to_text(html: &str) -> Option<String> {
    let fragment = Html::parse_fragment(html);
    let lines: Vec<String> = fragment
        .root_element()
        .text()
        .map(|chunk| chunk.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
