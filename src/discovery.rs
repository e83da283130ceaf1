use async_trait::async_trait;
use chrono::{DateTime, Days, Local, Months, NaiveDate, NaiveDateTime};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, LazyLock};

use crate::browser::{BrowserError, BrowserLauncher, BrowserSession};
use crate::canonical::derive_id;
use crate::config::ScraperConfig;
use crate::filters::{build_search_url, SearchFilters};
use crate::models::JobListing;
use crate::observe::{DiscoveryObserver, ScrapeEvent};

const RESULT_CARDS: &str = "ul.jobs-search__results-list > li";
const FALLBACK_CARDS: &str = "div.base-card";
// Either layout counts as rendered results.
const ANY_CARDS: &str = "ul.jobs-search__results-list > li, div.base-card";
const SIGN_IN_MODAL_DISMISS: &str = "button.modal__dismiss";

const TITLE: &str = "h3.base-search-card__title";
const COMPANY: &str = "h4.base-search-card__subtitle";
const LOCATION: &str = "span.job-search-card__location";
const LINK: &str = "a.base-card__full-link";
const POSTED: &str = "time.job-search-card__listdate, time.job-search-card__listdate--new";
const SNIPPET: &str = "p.job-search-card__snippet, div.base-search-card__metadata p";

static RELATIVE_DATE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(\d+|an?|one)\s+(minute|hour|day|week|month|year)s?\s+ago)$").ok()
});

/// Anything that can turn a search query into listings.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn search_jobs(
        &self,
        query: &str,
        location: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Vec<JobListing>;
}

/// Scrapes the public LinkedIn job search results page.
pub struct LinkedInScraper {
    launcher: Arc<dyn BrowserLauncher>,
    config: ScraperConfig,
    observer: Arc<dyn DiscoveryObserver>,
}

impl LinkedInScraper {
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

    /// Loads the first results page for `query` and returns up to `limit`
    /// listings in page order, never more than `result_limit`. Any transport
    /// or render failure yields an empty vector; the reason goes to the
    /// observer.
    pub async fn search_jobs(
        &self,
        query: &str,
        location: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Vec<JobListing> {
        let search_url = build_search_url(query, location, filters);
        let limit = limit.min(self.config.result_limit);

        let mut session = match self.launcher.open_session().await {
            Ok(session) => session,
            Err(e) => {
                self.observer.record(ScrapeEvent::SessionFailed {
                    error: e.to_string(),
                });
                return Vec::new();
            }
        };

        let outcome = self
            .collect_cards(session.as_mut(), query, &search_url)
            .await;

        if let Err(e) = session.close().await {
            self.observer.record(ScrapeEvent::SessionCloseFailed {
                error: e.to_string(),
            });
        }

        match outcome {
            Ok(cards) => self.parse_cards(query, &cards, limit),
            Err(e) => {
                self.report_failure(query, &search_url, e);
                Vec::new()
            }
        }
    }

    async fn collect_cards(
        &self,
        session: &mut dyn BrowserSession,
        query: &str,
        search_url: &str,
    ) -> Result<Vec<String>, BrowserError> {
        session
            .navigate(search_url, self.config.navigation_timeout)
            .await?;

        // The sign-in interstitial only shows up some of the time.
        let dismissed = session
            .click_if_visible(SIGN_IN_MODAL_DISMISS, self.config.modal_timeout)
            .await;
        if matches!(dismissed, Ok(true)) && !self.config.modal_settle.is_zero() {
            tokio::time::sleep(self.config.modal_settle).await;
        }

        if let Err(e) = session
            .wait_for_selector(ANY_CARDS, self.config.results_timeout)
            .await
        {
            self.capture_diagnostic(session, query).await;
            return Err(e);
        }

        let mut cards = session.query_all(RESULT_CARDS).await?;
        if cards.is_empty() {
            cards = session.query_all(FALLBACK_CARDS).await?;
        }
        if cards.is_empty() {
            self.observer.record(ScrapeEvent::NoCards {
                query: query.to_string(),
            });
            self.capture_diagnostic(session, query).await;
        }
        Ok(cards)
    }

    fn parse_cards(&self, query: &str, cards: &[String], limit: usize) -> Vec<JobListing> {
        self.observer.record(ScrapeEvent::CardsFound {
            query: query.to_string(),
            count: cards.len(),
        });

        let today = Local::now().date_naive();
        let mut listings = Vec::new();
        for (index, card) in cards.iter().enumerate() {
            if listings.len() >= limit {
                break;
            }
            match parse_card(card, today) {
                Some(listing) => listings.push(listing),
                None => self.observer.record(ScrapeEvent::CardSkipped {
                    query: query.to_string(),
                    index,
                    reason: "no job link".to_string(),
                }),
            }
        }
        listings
    }

    async fn capture_diagnostic(&self, session: &mut dyn BrowserSession, query: &str) {
        let Some(dir) = &self.config.debug_dir else {
            return;
        };
        if let Err(e) = std::fs::create_dir_all(dir) {
            self.observer.record(ScrapeEvent::DiagnosticFailed {
                error: e.to_string(),
            });
            return;
        }

        let path = dir.join(diagnostic_file_name(query));
        match session.save_screenshot(&path).await {
            Ok(()) => self.observer.record(ScrapeEvent::DiagnosticSaved { path }),
            Err(e) => self.observer.record(ScrapeEvent::DiagnosticFailed {
                error: e.to_string(),
            }),
        }
    }

    fn report_failure(&self, query: &str, search_url: &str, error: BrowserError) {
        let event = match &error {
            BrowserError::Timeout { what, .. } if what == ANY_CARDS => {
                ScrapeEvent::ResultsMissing {
                    query: query.to_string(),
                    error: error.to_string(),
                }
            }
            BrowserError::Launch(_) => ScrapeEvent::SessionFailed {
                error: error.to_string(),
            },
            BrowserError::Driver(_) => ScrapeEvent::DriverFailed {
                query: query.to_string(),
                error: error.to_string(),
            },
            _ => ScrapeEvent::NavigationFailed {
                url: search_url.to_string(),
                error: error.to_string(),
            },
        };
        self.observer.record(event);
    }
}

#[async_trait]
impl JobSource for LinkedInScraper {
    async fn search_jobs(
        &self,
        query: &str,
        location: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Vec<JobListing> {
        LinkedInScraper::search_jobs(self, query, location, filters, limit).await
    }
}

/// Parses one result card. Returns `None` only when the card has no job
/// link; every other field is optional.
pub fn parse_card(card_html: &str, today: NaiveDate) -> Option<JobListing> {
    let fragment = Html::parse_fragment(card_html);
    let root = fragment.root_element();

    let href = select_first(&root, LINK)
        .and_then(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())?;

    let mut listing = JobListing::new(href);
    listing.title = select_text(&root, TITLE);
    listing.company = select_text(&root, COMPANY);
    listing.location = select_text(&root, LOCATION);
    listing.description = select_text(&root, SNIPPET);
    listing.date_posted = select_first(&root, POSTED).and_then(|el| {
        let raw = el
            .value()
            .attr("datetime")
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .or_else(|| element_text(&el))?;
        parse_posted_date(&raw, today)
    });
    Some(listing)
}

/// Accepts `2024-05-01`, ISO-8601/RFC 3339 date-times and relative text
/// like `3 days ago`. Anything else is `None`.
pub fn parse_posted_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }

    parse_relative_date(raw, today)
}

fn parse_relative_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = raw.to_lowercase();
    if lower == "just now" || lower == "today" {
        return Some(today);
    }
    if lower == "yesterday" {
        return today.checked_sub_days(Days::new(1));
    }

    let re = RELATIVE_DATE.as_ref()?;
    let caps = re.captures(&lower)?;
    let amount: u32 = match caps.get(1)?.as_str() {
        "a" | "an" | "one" => 1,
        digits => digits.parse().ok()?,
    };

    match caps.get(2)?.as_str() {
        "minute" | "hour" => Some(today),
        "day" => today.checked_sub_days(Days::new(amount as u64)),
        "week" => today.checked_sub_days(Days::new(amount as u64 * 7)),
        "month" => today.checked_sub_months(Months::new(amount)),
        "year" => today.checked_sub_months(Months::new(amount.checked_mul(12)?)),
        _ => None,
    }
}

fn select_first<'a>(root: &ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    root.select(&selector).next()
}

fn select_text(root: &ElementRef<'_>, css: &str) -> Option<String> {
    select_first(root, css).and_then(|el| element_text(&el))
}

/// Visible text with whitespace collapsed; `None` when blank.
fn element_text(el: &ElementRef<'_>) -> Option<String> {
    let text = el.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() { None } else { Some(text) }
}

/// Readable slug plus a short hash, so queries that slug alike stay apart.
fn diagnostic_file_name(query: &str) -> String {
    format!("search-{}-{}.png", file_slug(query), &derive_id(query)[..8])
}

fn file_slug(query: &str) -> String {
    let slug: String = query
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() { "query".to_string() } else { slug }
}
